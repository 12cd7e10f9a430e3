use datasync_sync::transport::mock::RecordingSink;
use datasync_sync::{Chunk, ChunkSink, Destination, PeerTable, SyncError};
use datasync_types::{PeerId, SessionId};
use pretty_assertions::assert_eq;

fn chunk() -> Chunk {
    Chunk {
        session_id: SessionId::new(),
        index: 0,
        total: 1,
        dataset_type: "widget".into(),
        payload: b"x".to_vec(),
    }
}

// ── Destination ─────────────────────────────────────────────────

#[test]
fn destination_eq_and_copy() {
    let peer = PeerId::new();
    let a = Destination::Peer(peer);
    let b = a;
    assert_eq!(a, b);
    assert_ne!(a, Destination::AllPeers);
}

// ── PeerTable ───────────────────────────────────────────────────

#[tokio::test]
async fn peer_table_delivers_to_receiver() {
    let table = PeerTable::new();
    let peer = PeerId::new();
    let mut rx = table.connect(peer);

    let sent = chunk();
    table.send(&peer, sent.clone()).unwrap();

    assert_eq!(rx.recv().await, Some(sent));
    assert!(table.is_connected(&peer));
    assert_eq!(table.connected_peers(), vec![peer]);
}

#[test]
fn peer_table_unknown_peer() {
    let table = PeerTable::new();
    let peer = PeerId::new();
    let err = table.send(&peer, chunk()).unwrap_err();
    assert!(matches!(err, SyncError::PeerNotFound(p) if p == peer));
}

#[test]
fn peer_table_closed_receiver() {
    let table = PeerTable::new();
    let peer = PeerId::new();
    drop(table.connect(peer));

    assert!(matches!(table.send(&peer, chunk()), Err(SyncError::ChannelClosed)));
}

#[test]
fn peer_table_disconnect() {
    let table = PeerTable::new();
    let peer = PeerId::new();
    let _rx = table.connect(peer);
    assert_eq!(table.len(), 1);

    assert!(table.disconnect(&peer));
    assert!(!table.disconnect(&peer));
    assert!(table.is_empty());
    assert!(!table.is_connected(&peer));
}

#[test]
fn peer_table_lists_peers_sorted() {
    let table = PeerTable::new();
    let mut peers: Vec<PeerId> = (0..5).map(|_| PeerId::new()).collect();
    let _rxs: Vec<_> = peers.iter().rev().map(|p| table.connect(*p)).collect();

    peers.sort();
    assert_eq!(table.connected_peers(), peers);
}

// ── RecordingSink ───────────────────────────────────────────────

#[test]
fn recording_sink_records_in_order() {
    let peer = PeerId::new();
    let sink = RecordingSink::with_peers([peer]);
    let (a, b) = (chunk(), chunk());

    sink.send(&peer, a.clone()).unwrap();
    sink.send(&peer, b.clone()).unwrap();

    assert_eq!(sink.sent_to(&peer), vec![a, b]);
    assert_eq!(sink.take_sent().len(), 2);
    assert!(sink.sent().is_empty());
}

#[test]
fn recording_sink_rejects_unknown_and_failing_peers() {
    let peer = PeerId::new();
    let sink = RecordingSink::new();
    assert!(matches!(sink.send(&peer, chunk()), Err(SyncError::PeerNotFound(_))));

    sink.add_peer(peer);
    sink.fail_sends_to(peer);
    assert!(matches!(sink.send(&peer, chunk()), Err(SyncError::ChannelClosed)));

    sink.remove_peer(&peer);
    assert!(!sink.is_connected(&peer));
}
