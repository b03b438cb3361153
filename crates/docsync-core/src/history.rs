//! Undo/redo capability mirror
//!
//! The undo manager belongs to the CRDT layer. This adapter only projects
//! its stack depths into [`HistoryState`] for UI enablement and forwards
//! undo/redo calls.

use crate::signal::{Signal, Subscription};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// External undo/redo manager
pub trait UndoManager: Send + Sync {
    /// Entries on the undo stack
    fn undo_stack_len(&self) -> usize;

    /// Entries on the redo stack
    fn redo_stack_len(&self) -> usize;

    /// Undo one step; `false` if nothing was undone
    fn undo(&self) -> bool;

    /// Redo one step; `false` if nothing was redone
    fn redo(&self) -> bool;

    /// Undo stack is non-empty
    fn can_undo(&self) -> bool {
        self.undo_stack_len() > 0
    }

    /// Redo stack is non-empty
    fn can_redo(&self) -> bool {
        self.redo_stack_len() > 0
    }
}

/// Capability booleans for the toolbar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryState {
    /// Undo is available
    pub can_undo: bool,
    /// Redo is available
    pub can_redo: bool,
}

impl HistoryState {
    fn of(manager: Option<&dyn UndoManager>) -> Self {
        manager.map_or_else(Self::default, |m| Self {
            can_undo: m.can_undo(),
            can_redo: m.can_redo(),
        })
    }
}

/// Mirrors an optional [`UndoManager`] into a [`Signal<HistoryState>`]
#[derive(Default)]
pub struct HistoryAdapter {
    manager: RwLock<Option<Arc<dyn UndoManager>>>,
    mirror: Signal<HistoryState>,
}

impl HistoryAdapter {
    /// Adapter with no manager attached
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter already bound to `manager`
    #[must_use]
    pub fn with_manager(manager: Arc<dyn UndoManager>) -> Self {
        let adapter = Self::new();
        adapter.attach(manager);
        adapter
    }

    /// Live capabilities read straight from the manager; `(false, false)` when detached
    #[must_use]
    pub fn state(&self) -> HistoryState {
        HistoryState::of(self.manager.read().as_deref())
    }

    /// Last mirrored capabilities
    #[must_use]
    pub fn mirrored(&self) -> HistoryState {
        self.mirror.get()
    }

    /// Shorthand for `state().can_undo`
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.state().can_undo
    }

    /// Shorthand for `state().can_redo`
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.state().can_redo
    }

    /// Bind a manager and mirror its state
    pub fn attach(&self, manager: Arc<dyn UndoManager>) {
        *self.manager.write() = Some(manager);
        tracing::debug!("undo manager attached");
        self.refresh();
    }

    /// Unbind the manager; capabilities fall back to `(false, false)`
    pub fn detach(&self) {
        if self.manager.write().take().is_some() {
            tracing::debug!("undo manager detached");
        }
        self.refresh();
    }

    /// Whether a manager is attached
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.manager.read().is_some()
    }

    /// Re-read the manager; observers run only if capabilities changed
    pub fn refresh(&self) -> HistoryState {
        let state = self.state();
        self.mirror.set(state);
        state
    }

    /// Forward to the manager's undo, then refresh
    pub fn undo(&self) -> bool {
        let manager = self.manager.read().clone();
        let done = manager.is_some_and(|m| m.undo());
        self.refresh();
        done
    }

    /// Forward to the manager's redo, then refresh
    pub fn redo(&self) -> bool {
        let manager = self.manager.read().clone();
        let done = manager.is_some_and(|m| m.redo());
        self.refresh();
        done
    }

    /// Observe mirrored capability changes
    #[must_use = "dropping the subscription detaches the observer"]
    pub fn subscribe(
        &self,
        observer: impl Fn(&HistoryState) + Send + Sync + 'static,
    ) -> Subscription {
        self.mirror.subscribe(observer)
    }
}

impl std::fmt::Debug for HistoryAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryAdapter")
            .field("attached", &self.is_attached())
            .field("mirror", &self.mirror.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Stacks {
        undo: AtomicUsize,
        redo: AtomicUsize,
    }

    impl UndoManager for Stacks {
        fn undo_stack_len(&self) -> usize {
            self.undo.load(Ordering::SeqCst)
        }

        fn redo_stack_len(&self) -> usize {
            self.redo.load(Ordering::SeqCst)
        }

        fn undo(&self) -> bool {
            if self.undo.load(Ordering::SeqCst) == 0 {
                return false;
            }
            self.undo.fetch_sub(1, Ordering::SeqCst);
            self.redo.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn redo(&self) -> bool {
            if self.redo.load(Ordering::SeqCst) == 0 {
                return false;
            }
            self.redo.fetch_sub(1, Ordering::SeqCst);
            self.undo.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn detached_adapter_fails_closed() {
        let adapter = HistoryAdapter::new();
        assert_eq!(adapter.state(), HistoryState { can_undo: false, can_redo: false });
        assert!(!adapter.undo());
        assert!(!adapter.redo());
    }

    #[test]
    fn undo_moves_capability_to_redo() {
        let stacks = Arc::new(Stacks::default());
        stacks.undo.store(1, Ordering::SeqCst);
        let adapter = HistoryAdapter::with_manager(stacks.clone());
        assert_eq!(adapter.mirrored(), HistoryState { can_undo: true, can_redo: false });

        assert!(adapter.undo());
        assert_eq!(adapter.mirrored(), HistoryState { can_undo: false, can_redo: true });
    }

    #[test]
    fn detach_resets_mirror() {
        let stacks = Arc::new(Stacks::default());
        stacks.redo.store(2, Ordering::SeqCst);
        let adapter = HistoryAdapter::with_manager(stacks);
        assert!(adapter.mirrored().can_redo);

        adapter.detach();
        assert_eq!(adapter.mirrored(), HistoryState::default());
        assert!(!adapter.is_attached());
    }
}
