//! swiftchannel-core: wire format and lock-free SPSC queue for SwiftChannel.
//!
//! This is the protocol core. It defines the canonical memory layout of a
//! channel region and the single-producer/single-consumer framed byte ring
//! that lives inside it.
//!
//! # Characteristics
//!
//! - One sender process, one receiver process, one direction
//! - Absolute 64-bit indices; positions are `index & (ring_size - 1)`
//! - Wait-free `try_write`/`try_read`; a full ring is reported, never waited on
//! - A single release store on `write_index` publishes each frame
//! - Optional CRC-32 payload checksums
//!
//! # Memory Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  SharedHeader (128 bytes, cache-line aligned)                        │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  Padding to align_up(128, CACHE_LINE_SIZE), zero                     │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  Ring bytes (ring_size, power of two)                                │
//! │    frame = MessageHeader (32 bytes) + payload padded to 8 bytes      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The core consumes an already-mapped, zero-initialized byte region; mapping
//! and unmapping belong to the platform collaborator (`swiftchannel-shm`).

#![forbid(unsafe_op_in_unsafe_fn)]

pub mod channel;
pub mod config;
pub mod error;
pub mod handshake;
pub mod layout;
pub mod ring;
pub mod version;

pub use channel::{region_status, Channel, RegionStatus};
pub use config::ChannelConfig;
pub use error::{Error, Result};
pub use layout::{
    align_up, flags, region_size, ring_offset, MessageHeader, SharedHeader, CACHE_LINE_SIZE, MAGIC,
    MESSAGE_HEADER_SIZE, PAYLOAD_ALIGN, SHARED_HEADER_SIZE,
};
pub use ring::{ReadOutcome, RingBuffer};
pub use version::{Version, PROTOCOL_VERSION};
