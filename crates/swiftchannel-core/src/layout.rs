//! Canonical byte layouts of the shared region.
//!
//! These are `repr(C)` structures shared between two independently-built
//! processes; their sizes are pinned by compile-time assertions and all
//! integer fields are little-endian on the wire.

use std::sync::atomic::{AtomicU32, AtomicU64};

// The wire format is little-endian and the header is accessed in place.
#[cfg(target_endian = "big")]
compile_error!("swiftchannel regions are little-endian; big-endian hosts are not supported");

/// Magic constant identifying a channel region and each frame ("SWIF").
pub const MAGIC: u32 = 0x5357_4946;

/// Cache line size used for the ring's starting offset.
pub const CACHE_LINE_SIZE: usize = 64;

/// Size of [`SharedHeader`] in bytes.
pub const SHARED_HEADER_SIZE: usize = 128;

/// Size of [`MessageHeader`] in bytes.
pub const MESSAGE_HEADER_SIZE: usize = 32;

/// Payload lengths are padded to this alignment inside a frame.
pub const PAYLOAD_ALIGN: u64 = 8;

/// Round `value` up to the next multiple of `align` (a power of two).
#[inline]
pub const fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) & !(align - 1)
}

/// Byte offset of the ring within the region.
#[inline]
pub const fn ring_offset() -> usize {
    align_up(SHARED_HEADER_SIZE as u64, CACHE_LINE_SIZE as u64) as usize
}

/// Total region size for a given ring size.
#[inline]
pub const fn region_size(ring_size: u64) -> usize {
    ring_offset() + ring_size as usize
}

/// Configuration flag bits stored in [`SharedHeader::flags`].
pub mod flags {
    /// Checksum field is zero and the receiver skips CRC verification.
    pub const NO_CHECKSUM: u64 = 1 << 0;
    /// Reserved. Overwrite-on-full is not part of this protocol revision;
    /// regions carrying this bit are refused.
    pub const OVERWRITE: u64 = 1 << 1;
    /// Advisory: exactly one producer. Currently the only supported mode.
    pub const SINGLE_PRODUCER: u64 = 1 << 2;
    /// Advisory: exactly one consumer. Currently the only supported mode.
    pub const SINGLE_CONSUMER: u64 = 1 << 3;

    /// Bits a region is allowed to carry.
    pub const ACCEPTED: u64 = NO_CHECKSUM | SINGLE_PRODUCER | SINGLE_CONSUMER;
}

/// Control header at offset 0 of every channel region (128 bytes).
///
/// The two indices are absolute byte counters: they only ever grow, and the
/// ring position of an index is `index & (ring_size - 1)`. `magic` and the
/// two process ids are atomic because they are written while the peer may
/// already be reading the header; `version`, `ring_size` and `flags` are
/// plain fields, written only during initialization before `magic` is
/// published.
#[repr(C, align(64))]
pub struct SharedHeader {
    /// [`MAGIC`] once the region is initialized; 0 in a fresh region.
    pub magic: AtomicU32,
    /// Packed protocol version (see [`crate::version`]).
    pub version: u32,
    /// Byte capacity of the ring that follows; non-zero power of two.
    pub ring_size: u64,
    /// Total bytes ever written. Advanced only by the producer, release
    /// ordering; the single publication point for frames.
    pub write_index: AtomicU64,
    /// Total bytes ever consumed. Advanced only by the consumer, release
    /// ordering.
    pub read_index: AtomicU64,
    /// Process id of the current producer. Diagnostic only.
    pub sender_id: AtomicU32,
    /// Process id of the current consumer. Diagnostic only.
    pub receiver_id: AtomicU32,
    /// Configuration flag bits (see [`flags`]).
    pub flags: u64,
    /// Zero on write; ignored on read.
    pub reserved: [u8; 80],
}

const _: () = assert!(std::mem::size_of::<SharedHeader>() == SHARED_HEADER_SIZE);
const _: () = assert!(std::mem::align_of::<SharedHeader>() == CACHE_LINE_SIZE);

/// Per-frame header written immediately before each payload (32 bytes).
///
/// Encoded field-by-field as little-endian; never stored in the ring by
/// struct copy, so the wire format is independent of host struct layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct MessageHeader {
    /// [`MAGIC`]; the frame sentinel.
    pub magic: u32,
    /// Payload length in bytes, before padding.
    pub size: u32,
    /// Value of `write_index` at framing time; strictly increasing.
    pub sequence: u64,
    /// Steady-clock nanoseconds at write time. The epoch is unspecified and
    /// per-region; values from different channels are not comparable.
    pub timestamp: u64,
    /// CRC-32 of the payload, or zero when checksums are disabled.
    pub checksum: u32,
    /// Zero.
    pub reserved: u32,
}

const _: () = assert!(std::mem::size_of::<MessageHeader>() == MESSAGE_HEADER_SIZE);
const _: () = assert!(std::mem::align_of::<MessageHeader>() <= 8);

impl MessageHeader {
    /// Serialize to the 32-byte wire form.
    pub fn encode(&self) -> [u8; MESSAGE_HEADER_SIZE] {
        let mut out = [0u8; MESSAGE_HEADER_SIZE];
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..8].copy_from_slice(&self.size.to_le_bytes());
        out[8..16].copy_from_slice(&self.sequence.to_le_bytes());
        out[16..24].copy_from_slice(&self.timestamp.to_le_bytes());
        out[24..28].copy_from_slice(&self.checksum.to_le_bytes());
        out[28..32].copy_from_slice(&self.reserved.to_le_bytes());
        out
    }

    /// Deserialize from the 32-byte wire form.
    pub fn decode(bytes: &[u8; MESSAGE_HEADER_SIZE]) -> Self {
        let u32_at = |i: usize| u32::from_le_bytes(bytes[i..i + 4].try_into().unwrap());
        let u64_at = |i: usize| u64::from_le_bytes(bytes[i..i + 8].try_into().unwrap());
        Self {
            magic: u32_at(0),
            size: u32_at(4),
            sequence: u64_at(8),
            timestamp: u64_at(16),
            checksum: u32_at(24),
            reserved: u32_at(28),
        }
    }
}
