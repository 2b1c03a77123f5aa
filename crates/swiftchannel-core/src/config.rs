//! Channel configuration and the invariants it must satisfy.

use crate::error::{Error, Result};
use crate::layout::{align_up, flags, MESSAGE_HEADER_SIZE, PAYLOAD_ALIGN};

/// Smallest accepted ring.
pub const MIN_RING_SIZE: u64 = 4096;

/// Smallest accepted maximum message size.
pub const MIN_MAX_MESSAGE_SIZE: u32 = 64;

/// Configuration of a channel, supplied by both peers at attach time.
///
/// When attaching to an already-initialized region, `ring_size` and `flags`
/// embedded in the region header are authoritative; the configured values
/// are what a fresh region is initialized with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Ring capacity in bytes; power of two, at least [`MIN_RING_SIZE`].
    pub ring_size: u64,
    /// Largest accepted payload in bytes.
    pub max_message_size: u32,
    /// Flag bits (see [`flags`]).
    pub flags: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ring_size: 1024 * 1024,
            max_message_size: 64 * 1024,
            flags: flags::NO_CHECKSUM,
        }
    }
}

impl ChannelConfig {
    /// Largest frame this configuration can produce, header included.
    #[inline]
    pub fn max_frame_size(&self) -> u64 {
        MESSAGE_HEADER_SIZE as u64 + align_up(self.max_message_size as u64, PAYLOAD_ALIGN)
    }

    /// Whether payload checksums are computed and verified.
    #[inline]
    pub fn checksum_enabled(&self) -> bool {
        self.flags & flags::NO_CHECKSUM == 0
    }

    /// Refuse configurations a region must never be opened with.
    ///
    /// The frame-based bound (rather than the raw payload size) guarantees
    /// that even the largest frame occupies at most half the ring, so a
    /// drained ring always has room for it.
    pub fn validate(&self) -> Result<()> {
        if self.ring_size < MIN_RING_SIZE || !self.ring_size.is_power_of_two() {
            return Err(Error::InvalidOperation);
        }
        if self.max_message_size < MIN_MAX_MESSAGE_SIZE {
            return Err(Error::InvalidOperation);
        }
        if self.max_frame_size() > self.ring_size / 2 {
            return Err(Error::InvalidOperation);
        }
        validate_flags(self.flags)
    }
}

/// Refuse flag words carrying reserved bits.
pub fn validate_flags(word: u64) -> Result<()> {
    if word & !flags::ACCEPTED != 0 {
        return Err(Error::InvalidOperation);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> ChannelConfig {
        ChannelConfig {
            ring_size: 4096,
            max_message_size: 1024,
            flags: flags::NO_CHECKSUM,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        ChannelConfig::default().validate().unwrap();
    }

    #[test]
    fn test_small_config_is_valid() {
        small().validate().unwrap();
    }

    #[test]
    fn test_non_power_of_two_ring_rejected() {
        let cfg = ChannelConfig { ring_size: 5000, ..small() };
        assert_eq!(cfg.validate(), Err(Error::InvalidOperation));
    }

    #[test]
    fn test_tiny_ring_rejected() {
        let cfg = ChannelConfig { ring_size: 2048, max_message_size: 64, ..small() };
        assert_eq!(cfg.validate(), Err(Error::InvalidOperation));
    }

    #[test]
    fn test_tiny_max_message_rejected() {
        let cfg = ChannelConfig { max_message_size: 32, ..small() };
        assert_eq!(cfg.validate(), Err(Error::InvalidOperation));
    }

    #[test]
    fn test_largest_frame_must_fit_half_the_ring() {
        // 2040-byte payloads pass a naive `max < ring/2` check but their
        // frames exceed half of a 4096-byte ring.
        let cfg = ChannelConfig { max_message_size: 2040, ..small() };
        assert_eq!(cfg.validate(), Err(Error::InvalidOperation));

        let cfg = ChannelConfig { max_message_size: 2016, ..small() };
        cfg.validate().unwrap();
        assert_eq!(cfg.max_frame_size(), 2048);
    }

    #[test]
    fn test_reserved_flag_bits_rejected() {
        let cfg = ChannelConfig { flags: flags::OVERWRITE, ..small() };
        assert_eq!(cfg.validate(), Err(Error::InvalidOperation));

        let cfg = ChannelConfig { flags: 1 << 17, ..small() };
        assert_eq!(cfg.validate(), Err(Error::InvalidOperation));
    }

    #[test]
    fn test_advisory_flags_accepted() {
        let cfg = ChannelConfig {
            flags: flags::NO_CHECKSUM | flags::SINGLE_PRODUCER | flags::SINGLE_CONSUMER,
            ..small()
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn test_checksum_enabled_tracks_flag() {
        assert!(!small().checksum_enabled());
        let cfg = ChannelConfig { flags: 0, ..small() };
        assert!(cfg.checksum_enabled());
    }
}
