use datasync_sync::codec::MAX_PAYLOAD_SIZE;
use datasync_sync::protocol::{
    DEFAULT_MAX_CHUNK_SIZE, DEFAULT_PEER_SETTLE_DELAY, DEFAULT_SESSION_TIMEOUT,
    DEFAULT_SWEEP_INTERVAL,
};
use datasync_sync::{SyncConfig, SyncError};
use std::time::Duration;

#[test]
fn defaults() {
    let config = SyncConfig::default();
    assert_eq!(config.max_chunk_size, 30_000);
    assert_eq!(config.session_timeout, Duration::from_secs(60));
    assert_eq!(config.sweep_interval, Duration::from_secs(30));
    assert_eq!(config.peer_settle_delay, Duration::from_secs(5));
    assert_eq!(config.max_chunk_size, DEFAULT_MAX_CHUNK_SIZE);
    assert_eq!(config.session_timeout, DEFAULT_SESSION_TIMEOUT);
    assert_eq!(config.sweep_interval, DEFAULT_SWEEP_INTERVAL);
    assert_eq!(config.peer_settle_delay, DEFAULT_PEER_SETTLE_DELAY);
    assert!(config.validate().is_ok());
}

#[test]
fn zero_chunk_size_rejected() {
    let config = SyncConfig {
        max_chunk_size: 0,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(SyncError::Config(_))));
}

#[test]
fn chunk_size_above_frame_limit_rejected() {
    let at_limit = SyncConfig {
        max_chunk_size: MAX_PAYLOAD_SIZE,
        ..Default::default()
    };
    assert!(at_limit.validate().is_ok());

    let over = SyncConfig {
        max_chunk_size: MAX_PAYLOAD_SIZE + 1,
        ..Default::default()
    };
    assert!(matches!(over.validate(), Err(SyncError::Config(_))));
}

#[test]
fn zero_chunk_count_limit_rejected() {
    let config = SyncConfig {
        max_total_chunks: 0,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(SyncError::Config(_))));
}

#[test]
fn zero_durations_rejected() {
    let no_timeout = SyncConfig {
        session_timeout: Duration::ZERO,
        ..Default::default()
    };
    assert!(no_timeout.validate().is_err());

    let no_sweep = SyncConfig {
        sweep_interval: Duration::ZERO,
        ..Default::default()
    };
    assert!(no_sweep.validate().is_err());

    let no_settle = SyncConfig {
        peer_settle_delay: Duration::ZERO,
        ..Default::default()
    };
    assert!(no_settle.validate().is_ok());
}
