//! Producer end of a channel.

use std::sync::Arc;

use swiftchannel_core::{Channel, ChannelConfig, Result};
use swiftchannel_shm::{PlatformSharedMemory, SharedMemory};

use crate::stats::ChannelObserver;

/// Producer handle for a named channel.
///
/// Creating a sender maps (and, when fresh, initializes) the shared region.
/// Sends are wait-free: a full ring comes back as
/// [`ChannelFull`](crate::Error::ChannelFull) with no side effect, to be
/// retried after the receiver drains.
///
/// A sender is `Send` but not `Sync`: the channel is single-producer, so
/// all sends must come from one thread at a time.
pub struct Sender {
    name: String,
    config: ChannelConfig,
    channel: Channel,
    // Keeps the mapping alive for as long as the channel borrows it.
    _shm: PlatformSharedMemory,
    observer: Option<Arc<dyn ChannelObserver>>,
}

impl Sender {
    /// Create (or join) the channel named `name`.
    pub fn create(name: &str, config: ChannelConfig) -> Result<Self> {
        Self::build(name, config, None)
    }

    /// Like [`Sender::create`], with an observer notified on every outcome.
    pub fn with_observer(
        name: &str,
        config: ChannelConfig,
        observer: Arc<dyn ChannelObserver>,
    ) -> Result<Self> {
        Self::build(name, config, Some(observer))
    }

    fn build(
        name: &str,
        config: ChannelConfig,
        observer: Option<Arc<dyn ChannelObserver>>,
    ) -> Result<Self> {
        config.validate()?;
        let shm = PlatformSharedMemory::create_or_open(
            name,
            swiftchannel_core::region_size(config.ring_size),
            true,
        )?;
        // SAFETY: the mapping is owned by this Sender and outlives the
        // channel; fresh regions come back zeroed; this is the sole producer.
        let channel = unsafe { Channel::for_sender(shm.as_ptr(), shm.len(), &config) }?;
        tracing::debug!(name, ring_size = config.ring_size, "sender attached");
        Ok(Self {
            name: name.to_owned(),
            config,
            channel,
            _shm: shm,
            observer,
        })
    }

    /// Publish one message. Wait-free.
    pub fn send(&self, payload: &[u8]) -> Result<()> {
        match self.channel.send(payload) {
            Ok(()) => {
                if let Some(obs) = &self.observer {
                    obs.message_sent(payload.len());
                }
                Ok(())
            }
            Err(err) => {
                if let Some(obs) = &self.observer {
                    obs.send_failed(err);
                }
                Err(err)
            }
        }
    }

    /// Publish one message, reporting only success.
    pub fn try_send(&self, payload: &[u8]) -> bool {
        self.send(payload).is_ok()
    }

    /// Bytes currently free in the ring. Advisory.
    pub fn free_space(&self) -> u64 {
        self.channel.free_space()
    }

    /// Whether the handle can send.
    pub fn is_ready(&self) -> bool {
        self.channel.is_open()
    }

    /// Channel name, undecorated.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration this sender attached with.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Release the in-process handle. Idempotent. The region itself stays
    /// for the receiver; destroy it via the platform layer when both peers
    /// are done.
    pub fn close(&mut self) {
        self.channel.close();
    }
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("name", &self.name)
            .field("ring_size", &self.config.ring_size)
            .field("open", &self.channel.is_open())
            .finish()
    }
}
