//! Consumer end of a channel.
//!
//! The protocol core is strictly non-blocking; everything about *when* to
//! poll lives here. A receiver can be driven three ways: one poll at a time
//! ([`Receiver::poll_one`]), a blocking loop in the calling thread
//! ([`Receiver::run`]), or a background thread ([`Receiver::spawn`]). The
//! loop yields the CPU on every empty poll.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use swiftchannel_core::{Channel, ChannelConfig, Error, ReadOutcome, Result};
use swiftchannel_shm::{PlatformSharedMemory, SharedMemory};

use crate::stats::ChannelObserver;

/// The channel, its mapping and the reusable receive buffer.
///
/// Moves into the worker thread for [`Receiver::spawn`]; everything else
/// borrows it in place.
struct Inner {
    channel: Channel,
    // Keeps the mapping alive for as long as the channel borrows it.
    _shm: PlatformSharedMemory,
    scratch: Vec<u8>,
}

// SAFETY: Inner moves between threads whole; the SPSC contract (one
// consumer at a time) is upheld by the surrounding Receiver state machine.
unsafe impl Send for Inner {}

impl Inner {
    /// Poll once. `Ok(true)` when a message was handed to `handler`.
    fn poll_one(
        &mut self,
        handler: &mut dyn FnMut(&[u8]),
        observer: Option<&Arc<dyn ChannelObserver>>,
    ) -> Result<bool> {
        match self.channel.recv(&mut self.scratch) {
            Ok(ReadOutcome::Delivered { len }) => {
                handler(&self.scratch[..len]);
                if let Some(obs) = observer {
                    obs.message_received(len);
                }
                Ok(true)
            }
            Ok(ReadOutcome::Empty) => Ok(false),
            // The scratch buffer covers max_message_size, so a bigger frame
            // means the peer disagrees about the configuration.
            Ok(ReadOutcome::BufferTooSmall { .. }) => {
                if let Some(obs) = observer {
                    obs.receive_failed(Error::InvalidMessage);
                }
                Err(Error::InvalidMessage)
            }
            Ok(_) => unreachable!("corruption outcomes surface as errors"),
            Err(err) => {
                if let Some(obs) = observer {
                    obs.receive_failed(err);
                }
                Err(err)
            }
        }
    }
}

/// Consumer handle for a named channel.
pub struct Receiver {
    name: String,
    config: ChannelConfig,
    /// `None` while a worker thread owns the channel.
    inner: Mutex<Option<Inner>>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    observer: Option<Arc<dyn ChannelObserver>>,
}

impl Receiver {
    /// Open the channel named `name`. The sender must have created it;
    /// otherwise [`Error::ChannelNotFound`].
    pub fn open(name: &str, config: ChannelConfig) -> Result<Self> {
        Self::build(name, config, None)
    }

    /// Like [`Receiver::open`], with an observer notified on every outcome.
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
            false,
        )?;
        // SAFETY: the mapping is owned by the Inner and outlives the
        // channel; this is the sole consumer.
        let channel = unsafe { Channel::for_receiver(shm.as_ptr(), shm.len(), &config) }?;
        let scratch = vec![0u8; channel.max_message_size() as usize];
        tracing::debug!(name, ring_size = config.ring_size, "receiver attached");
        Ok(Self {
            name: name.to_owned(),
            config,
            inner: Mutex::new(Some(Inner {
                channel,
                _shm: shm,
                scratch,
            })),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            observer,
        })
    }

    /// Poll for one message without blocking. `Ok(true)` when a message was
    /// delivered to `handler`, `Ok(false)` when the ring was empty.
    ///
    /// Fails with [`Error::InvalidOperation`] while a background worker owns
    /// the channel.
    pub fn poll_one(&self, mut handler: impl FnMut(&[u8])) -> Result<bool> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or(Error::InvalidOperation)?;
        inner.poll_one(&mut handler, self.observer.as_ref())
    }

    /// Consume messages in the calling thread until [`Receiver::stop`] is
    /// called from elsewhere or the channel fails.
    pub fn run(&self, mut handler: impl FnMut(&[u8])) -> Result<()> {
        let mut inner = self
            .inner
            .lock()
            .take()
            .ok_or(Error::InvalidOperation)?;
        self.running.store(true, Ordering::Release);

        let result = run_loop(
            &mut inner,
            &mut handler,
            &self.running,
            self.observer.as_ref(),
        );

        self.running.store(false, Ordering::Release);
        *self.inner.lock() = Some(inner);
        result
    }

    /// Consume messages in a background thread until [`Receiver::stop`].
    pub fn spawn(&self, mut handler: impl FnMut(&[u8]) + Send + 'static) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(Error::InvalidOperation);
        }
        let mut inner = self
            .inner
            .lock()
            .take()
            .ok_or(Error::InvalidOperation)?;

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let observer = self.observer.clone();
        let name = self.name.clone();

        *worker = Some(std::thread::spawn(move || {
            if let Err(err) = run_loop(&mut inner, &mut handler, &running, observer.as_ref()) {
                tracing::warn!(channel = %name, %err, "receiver loop stopped on error");
            }
            running.store(false, Ordering::Release);
        }));
        Ok(())
    }

    /// Stop a running loop and join the worker thread, if any. Idempotent.
    ///
    /// After a worker thread has run, the channel stays with that thread's
    /// state; reopen the receiver to poll again.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }

    /// Whether a consume loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Channel name, undecorated.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration this receiver attached with.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    inner: &mut Inner,
    handler: &mut dyn FnMut(&[u8]),
    running: &AtomicBool,
    observer: Option<&Arc<dyn ChannelObserver>>,
) -> Result<()> {
    while running.load(Ordering::Acquire) {
        match inner.poll_one(handler, observer) {
            Ok(true) => {}
            Ok(false) => std::thread::yield_now(),
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("name", &self.name)
            .field("ring_size", &self.config.ring_size)
            .field("running", &self.is_running())
            .finish()
    }
}
