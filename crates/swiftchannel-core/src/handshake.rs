//! First-touch initialization and attach-time validation of a region header.
//!
//! A fresh region is all zeroes, so `magic == 0` marks it uninitialized.
//! Whichever peer finds it so (conventionally the sender) initializes it;
//! `magic` is published last, with release ordering, so a peer that observes
//! a valid magic also observes the fields written before it.

use std::sync::atomic::Ordering;

use crate::error::{Error, Result};
use crate::layout::{SharedHeader, MAGIC};
use crate::version::{packed_compatible, PROTOCOL_VERSION};

/// Initialize a freshly mapped, zeroed header.
///
/// Called exactly once per region, by the peer that found `magic == 0`.
/// The caller must hold the only reference to the header until `magic` is
/// stored; after that the region is live and the peer may attach.
pub fn initialize(header: &mut SharedHeader, ring_size: u64, flags: u64) {
    header.version = PROTOCOL_VERSION.pack();
    header.ring_size = ring_size;
    header.flags = flags;
    header.reserved = [0; 80];
    header.write_index.store(0, Ordering::Release);
    header.read_index.store(0, Ordering::Release);
    header.sender_id.store(std::process::id(), Ordering::Relaxed);
    header.receiver_id.store(0, Ordering::Relaxed);
    // Publishing the magic makes everything above visible to the peer.
    header.magic.store(MAGIC, Ordering::Release);
}

/// Attach to an already-initialized region as the producer.
///
/// The caller is expected to check for `magic == 0` first and run
/// [`initialize`] instead in that case.
pub fn sender_attach(header: &SharedHeader) -> Result<()> {
    validate(header)?;
    header.sender_id.store(std::process::id(), Ordering::Relaxed);
    Ok(())
}

/// Attach to a region as the consumer.
///
/// The receiver never initializes: binding to a zeroed region would let it
/// observe torn state while the sender is still writing the header, so an
/// uninitialized region is reported as [`Error::ChannelNotFound`].
pub fn receiver_attach(header: &SharedHeader) -> Result<()> {
    if header.magic.load(Ordering::Acquire) == 0 {
        return Err(Error::ChannelNotFound);
    }
    validate(header)?;
    header.receiver_id.store(std::process::id(), Ordering::Relaxed);
    Ok(())
}

/// Validate an initialized header: magic, version compatibility, ring size.
pub fn validate(header: &SharedHeader) -> Result<()> {
    if header.magic.load(Ordering::Acquire) != MAGIC {
        return Err(Error::InvalidMemoryLayout);
    }
    if !packed_compatible(header.version, PROTOCOL_VERSION.pack()) {
        return Err(Error::VersionMismatch);
    }
    if header.ring_size == 0 || !header.ring_size.is_power_of_two() {
        return Err(Error::InvalidMemoryLayout);
    }
    Ok(())
}
