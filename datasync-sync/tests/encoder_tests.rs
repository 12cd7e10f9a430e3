use datasync_sync::transport::mock::RecordingSink;
use datasync_sync::{Chunk, ChunkEncoder, Destination, Reassembler, ReceiveOutcome};
use datasync_types::PeerId;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::time::Duration;

fn concat(chunks: &[Chunk]) -> Vec<u8> {
    chunks.iter().flat_map(|c| c.payload.iter().copied()).collect()
}

// ── split ───────────────────────────────────────────────────────

#[test]
fn small_payload_is_one_chunk() {
    let chunks = ChunkEncoder::new(10).split("widget", b"0123456789").unwrap();

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].index, 0);
    assert_eq!(chunks[0].total, 1);
    assert_eq!(chunks[0].payload, b"0123456789");
    assert_eq!(chunks[0].dataset_type, "widget");
}

#[test]
fn empty_payload_is_one_empty_chunk() {
    let chunks = ChunkEncoder::new(10).split("widget", b"").unwrap();
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].payload.is_empty());
    assert!(chunks[0].is_single());
}

#[test]
fn large_payload_is_split_contiguously() {
    let payload: Vec<u8> = (0..35).collect();
    let chunks = ChunkEncoder::new(10).split("widget", &payload).unwrap();

    assert_eq!(chunks.len(), 4);
    let session = chunks[0].session_id;
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.index as usize, i);
        assert_eq!(chunk.total, 4);
        assert_eq!(chunk.session_id, session);
    }
    assert_eq!(chunks[3].payload.len(), 5);
    assert_eq!(concat(&chunks), payload);
}

#[test]
fn each_split_gets_a_fresh_session() {
    let encoder = ChunkEncoder::new(10);
    let a = encoder.split("widget", b"x").unwrap();
    let b = encoder.split("widget", b"x").unwrap();
    assert_ne!(a[0].session_id, b[0].session_id);
}

#[test]
fn zero_chunk_size_is_clamped() {
    let encoder = ChunkEncoder::new(0);
    assert_eq!(encoder.max_chunk_size(), 1);
    assert_eq!(encoder.split("widget", b"abc").unwrap().len(), 3);
}

// ── send ────────────────────────────────────────────────────────

#[test]
fn broadcast_sends_identical_chunks_to_every_peer() {
    let (a, b) = (PeerId::new(), PeerId::new());
    let sink = RecordingSink::with_peers([a, b]);

    let report = ChunkEncoder::new(4)
        .send("widget", b"hello world", Destination::AllPeers, &sink)
        .unwrap();

    assert_eq!(report.chunk_count, 3);
    assert_eq!(report.delivered, vec![a, b]);
    assert!(report.failed.is_empty());
    assert_eq!(sink.sent_to(&a), sink.sent_to(&b));
    assert!(sink.sent_to(&a).iter().all(|c| c.session_id == report.session_id));
}

#[test]
fn send_to_one_peer() {
    let (a, b) = (PeerId::new(), PeerId::new());
    let sink = RecordingSink::with_peers([a, b]);

    let report = ChunkEncoder::new(4)
        .send("widget", b"hello", Destination::Peer(b), &sink)
        .unwrap();

    assert_eq!(report.delivered, vec![b]);
    assert!(sink.sent_to(&a).is_empty());
    assert_eq!(sink.sent_to(&b).len(), 2);
}

#[test]
fn failing_peer_does_not_stop_others() {
    let (a, b) = (PeerId::new(), PeerId::new());
    let sink = RecordingSink::with_peers([a, b]);
    sink.fail_sends_to(a);

    let report = ChunkEncoder::new(4)
        .send("widget", b"hello world", Destination::AllPeers, &sink)
        .unwrap();

    assert_eq!(report.failed, vec![a]);
    assert_eq!(report.delivered, vec![b]);
    assert_eq!(sink.sent_to(&b).len(), 3);
}

#[test]
fn broadcast_without_peers_sends_nothing() {
    let sink = RecordingSink::new();
    let report = ChunkEncoder::new(4)
        .send("widget", b"hello", Destination::AllPeers, &sink)
        .unwrap();
    assert!(report.delivered.is_empty());
    assert!(sink.sent().is_empty());
}

// ── Properties ──────────────────────────────────────────────────

/// Payload, chunk size and a random arrival order over the resulting chunks.
fn payload_and_order() -> impl Strategy<Value = (Vec<u8>, usize, Vec<usize>)> {
    (proptest::collection::vec(any::<u8>(), 0..400), 1usize..64).prop_flat_map(
        |(payload, max)| {
            let count = ChunkEncoder::new(max)
                .split("widget", &payload)
                .map(|chunks| chunks.len())
                .unwrap_or(0);
            let order = Just((0..count).collect::<Vec<_>>()).prop_shuffle();
            (Just(payload), Just(max), order)
        },
    )
}

proptest! {
    #[test]
    fn split_then_reassemble_in_any_order(
        (payload, max, mut order) in payload_and_order(),
        dups in proptest::collection::vec(any::<prop::sample::Index>(), 0..8),
    ) {
        let chunks = ChunkEncoder::new(max).split("widget", &payload).unwrap();
        prop_assert_eq!(order.len(), chunks.len());

        // Duplicates go before the final chunk so completion stays last.
        let last = order.pop().unwrap();
        let mut deliveries: Vec<usize> = order.clone();
        for dup in &dups {
            if !order.is_empty() {
                deliveries.push(order[dup.index(order.len())]);
            }
        }
        deliveries.push(last);

        let reassembler = Reassembler::new(Duration::from_secs(60));
        let mut completed = Vec::new();
        for i in deliveries {
            if let ReceiveOutcome::Complete(p) = reassembler.receive(chunks[i].clone()) {
                completed.push(p.bytes);
            }
        }

        prop_assert_eq!(completed.len(), 1);
        prop_assert_eq!(&completed[0], &payload);
        prop_assert_eq!(reassembler.session_count(), 0);
    }
}
