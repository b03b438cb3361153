use docsync_core::*;
use docsync_test_utils::hydrated_session;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;

use ConnectionStatus::*;

#[tokio::test]
async fn test_drive_applies_events_in_order() {
    let (session, _sink) = hydrated_session("doc-1");
    let session = Arc::new(session);
    let mut watch = session.watch_status();
    let (tx, rx) = mpsc::channel(16);

    let driver = tokio::spawn(drive(Arc::clone(&session), rx));
    for event in [
        TransportEvent::HandshakeSucceeded,
        TransportEvent::SyncStarted,
        TransportEvent::CaughtUp,
        TransportEvent::ConnectionBlip,
        TransportEvent::ConnectionRestored,
        TransportEvent::Failed,
    ] {
        tx.send(event).await.unwrap();
    }
    drop(tx);

    let applied = driver.await.unwrap();
    assert_eq!(applied, 6);

    let mut seen = Vec::new();
    for _ in 0..6 {
        seen.push(watch.next().await.unwrap().to);
    }
    assert_eq!(seen, vec![Connected, Syncing, Synced, Reconnecting, Synced, Disconnected]);
    assert!(!session.is_editable());
}

#[tokio::test]
async fn test_drive_skips_rejected_events() {
    let (session, _sink) = hydrated_session("doc-1");
    let session = Arc::new(session);
    let (tx, rx) = mpsc::channel(16);

    let driver = tokio::spawn(drive(Arc::clone(&session), rx));
    // Blip before sync and retry while connected are both out of table.
    for event in [
        TransportEvent::ConnectionBlip,
        TransportEvent::HandshakeSucceeded,
        TransportEvent::Retry,
        TransportEvent::Backpressure,
        TransportEvent::BackpressureRelieved(Syncing),
        TransportEvent::Failed,
        TransportEvent::Retry,
    ] {
        tx.send(event).await.unwrap();
    }
    drop(tx);

    assert_eq!(driver.await.unwrap(), 5);
    assert_eq!(session.status(), Connecting);
    let statuses: Vec<_> = session.journal().changes().iter().map(|c| c.to).collect();
    assert_eq!(statuses, vec![Connected, Overloaded, Syncing, Disconnected, Connecting]);
}

#[tokio::test]
async fn test_watch_ends_when_session_dropped() {
    let (session, _sink) = hydrated_session("doc-1");
    let mut watch = session.watch_status();
    session.apply_status(Connected).unwrap();
    drop(session);

    assert_eq!(watch.next_change().await.map(|c| c.to), Some(Connected));
    assert_eq!(watch.next_change().await, None);
}
