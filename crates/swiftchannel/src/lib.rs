//! swiftchannel: low-latency one-way message passing over shared memory.
//!
//! A single **sender** process produces discrete messages; a single
//! **receiver** process consumes them in order. The transport is a shared
//! memory region holding a fixed-layout control header and a power-of-two
//! ring buffer, coordinated lock-free by two monotonically increasing
//! 64-bit indices.
//!
//! # Quick Start
//!
//! Producer process:
//!
//! ```no_run
//! use swiftchannel::prelude::*;
//!
//! let sender = Sender::create("price_feed", ChannelConfig::default())?;
//! sender.send(b"hello")?;
//! # Ok::<(), swiftchannel::Error>(())
//! ```
//!
//! Consumer process:
//!
//! ```no_run
//! use swiftchannel::prelude::*;
//!
//! let receiver = Receiver::open("price_feed", ChannelConfig::default())?;
//! receiver.poll_one(|payload| println!("got {} bytes", payload.len()))?;
//! # Ok::<(), swiftchannel::Error>(())
//! ```
//!
//! # Guarantees
//!
//! - FIFO per producer: messages arrive in the order they were sent.
//! - `send` and `poll_one` are wait-free; a full ring surfaces as
//!   [`Error::ChannelFull`], an empty one as an ordinary `false`.
//! - Peers built from different minor/patch revisions of the same protocol
//!   major interoperate; a major mismatch fails the attach.
//!
//! # Non-goals
//!
//! One producer, one consumer, one host. No delivery retry, no persistence,
//! no payload authentication. Corruption of a frame is fatal to the channel;
//! recovery means destroying and recreating the region.

#![forbid(unsafe_op_in_unsafe_fn)]

pub mod receiver;
pub mod sender;
pub mod stats;

pub use receiver::Receiver;
pub use sender::Sender;
pub use stats::{ChannelObserver, ChannelStats, StatsSnapshot};

// Core protocol types, re-exported for callers that work below the façade.
pub use swiftchannel_core::{
    flags, region_status, Channel, ChannelConfig, Error, MessageHeader, ReadOutcome, RegionStatus,
    Result, SharedHeader, Version, PROTOCOL_VERSION,
};

pub use swiftchannel_shm::{PlatformSharedMemory, SharedMemory};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use swiftchannel::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ChannelConfig, ChannelObserver, ChannelStats, Error, ReadOutcome, Receiver, Result, Sender,
    };
}
