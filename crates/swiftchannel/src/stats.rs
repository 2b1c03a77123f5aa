//! Channel diagnostics as an injected observer.
//!
//! The channel itself owns no process-wide state: callers that want
//! counters hand the sender/receiver an observer and read it back whenever
//! they like. [`ChannelStats`] is the ready-made atomic-counter
//! implementation; custom observers only override the hooks they care
//! about.

use std::sync::atomic::{AtomicU64, Ordering};

use swiftchannel_core::Error;

/// Hooks a channel end notifies on every send/recv outcome.
///
/// All methods default to no-ops. Implementations must be cheap and
/// non-blocking; they run on the message path.
pub trait ChannelObserver: Send + Sync {
    /// A message of `bytes` payload bytes was published.
    fn message_sent(&self, bytes: usize) {
        let _ = bytes;
    }

    /// A message of `bytes` payload bytes was delivered.
    fn message_received(&self, bytes: usize) {
        let _ = bytes;
    }

    /// A send failed (including transient [`Error::ChannelFull`]).
    fn send_failed(&self, error: Error) {
        let _ = error;
    }

    /// A receive failed.
    fn receive_failed(&self, error: Error) {
        let _ = error;
    }
}

/// Atomic counters over every observable channel outcome.
#[derive(Debug, Default)]
pub struct ChannelStats {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    send_errors: AtomicU64,
    receive_errors: AtomicU64,
    buffer_full_events: AtomicU64,
    checksum_errors: AtomicU64,
}

/// Point-in-time copy of [`ChannelStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_errors: u64,
    pub receive_errors: u64,
    pub buffer_full_events: u64,
    pub checksum_errors: u64,
}

impl ChannelStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            buffer_full_events: self.buffer_full_events.load(Ordering::Relaxed),
            checksum_errors: self.checksum_errors.load(Ordering::Relaxed),
        }
    }
}

impl ChannelObserver for ChannelStats {
    fn message_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn message_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn send_failed(&self, error: Error) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
        if error == Error::ChannelFull {
            self.buffer_full_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn receive_failed(&self, error: Error) {
        self.receive_errors.fetch_add(1, Ordering::Relaxed);
        if error == Error::ChecksumMismatch {
            self.checksum_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}
