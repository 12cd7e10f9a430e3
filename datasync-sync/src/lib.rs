//! Chunked snapshot sync for datasync.
//!
//! Carries encoded dataset snapshots to remote peers over links with a
//! bounded message size.
//!
//! ## Components
//!
//! - **Protocol**: the [`Chunk`] unit and protocol defaults
//! - **Codec**: binary framing of chunks for byte streams
//! - **Transport**: the outbound [`ChunkSink`] and an in-process [`PeerTable`]
//! - **Encoder**: splits payloads into chunks and hands them to a sink
//! - **Reassembler**: per-peer session tracking, reassembly and garbage collection
//! - **Coordinator**: wires dataset stores to the encoder and reassembler
//!
//! ## Sync Process
//!
//! 1. A local reload of a sync-enabled type publishes a new snapshot
//! 2. The coordinator encodes the snapshot once and splits it into chunks
//! 3. Every connected peer receives the same chunks
//! 4. Each peer reassembles the session, in any arrival order
//! 5. The complete payload replaces the peer's snapshot of that type
//!
//! # Example
//!
//! ```
//! use datasync_sync::{ChunkEncoder, Reassembler, ReceiveOutcome};
//! use std::time::Duration;
//!
//! let encoder = ChunkEncoder::new(4);
//! let chunks = encoder.split("widget", b"hello world").unwrap();
//! assert_eq!(chunks.len(), 3);
//!
//! let reassembler = Reassembler::new(Duration::from_secs(60));
//! let mut last = None;
//! for chunk in chunks.into_iter().rev() {
//!     last = Some(reassembler.receive(chunk));
//! }
//! match last {
//!     Some(ReceiveOutcome::Complete(payload)) => assert_eq!(payload.bytes, b"hello world"),
//!     other => panic!("unexpected outcome: {other:?}"),
//! }
//! ```

pub mod codec;
mod config;
mod coordinator;
mod encoder;
mod error;
pub mod protocol;
mod reassembler;
pub mod transport;

pub use config::SyncConfig;
pub use coordinator::SyncCoordinator;
pub use encoder::{ChunkEncoder, SendReport};
pub use error::{SyncError, SyncResult};
pub use protocol::Chunk;
pub use reassembler::{AssembledPayload, Reassembler, ReceiveOutcome};
pub use transport::{ChunkSink, Destination, PeerTable};
