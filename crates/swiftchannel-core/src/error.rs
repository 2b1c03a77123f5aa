//! Error type shared by every SwiftChannel crate.

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure a channel operation can surface.
///
/// Each variant carries a stable numeric code, grouped by concern
/// (1000s channel, 2000s message, 3000s memory, 5000s system,
/// 6000s versioning) so peers built from different revisions agree on
/// what a code means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The named region does not exist, or a receiver attached before the
    /// sender initialized it.
    ChannelNotFound,
    /// Exclusive creation hit an existing region.
    ChannelAlreadyExists,
    /// The ring has no room for the frame. Transient; retry after the
    /// consumer drains.
    ChannelFull,
    /// The in-process handle was closed.
    ChannelClosed,
    /// Channel names must be non-empty ASCII identifiers.
    InvalidChannelName,
    /// Payload exceeds the configured maximum message size.
    MessageTooLarge,
    /// A frame announced a size the region cannot hold, or a delivered
    /// frame does not fit the receiver's scratch buffer.
    InvalidMessage,
    /// A frame's sentinel did not match; the stream is no longer
    /// self-framing and the region must be torn down.
    MessageCorrupted,
    /// Payload CRC-32 did not match the frame header.
    ChecksumMismatch,
    /// The host refused to provide backing memory.
    OutOfMemory,
    /// Mapping the region into this process failed.
    MappingFailed,
    /// Region contents violate the layout contract (bad magic, bad ring
    /// size, region too small).
    InvalidMemoryLayout,
    /// The OS denied access to the region.
    PermissionDenied,
    /// The region is busy at the OS level.
    ResourceBusy,
    /// The operation is invalid in the current state, including refused
    /// configurations.
    InvalidOperation,
    /// The region was initialized by a peer with a different protocol major.
    VersionMismatch,
    /// The peers agree on the major version but the region advertises
    /// semantics this build cannot honor.
    IncompatibleProtocol,
}

impl Error {
    /// Stable numeric code for this error.
    pub const fn code(self) -> i32 {
        match self {
            Error::ChannelNotFound => 1000,
            Error::ChannelAlreadyExists => 1001,
            Error::ChannelFull => 1002,
            Error::ChannelClosed => 1003,
            Error::InvalidChannelName => 1004,
            Error::MessageTooLarge => 2000,
            Error::InvalidMessage => 2001,
            Error::MessageCorrupted => 2002,
            Error::ChecksumMismatch => 2003,
            Error::OutOfMemory => 3000,
            Error::MappingFailed => 3002,
            Error::InvalidMemoryLayout => 3003,
            Error::PermissionDenied => 5001,
            Error::ResourceBusy => 5002,
            Error::InvalidOperation => 5003,
            Error::VersionMismatch => 6000,
            Error::IncompatibleProtocol => 6001,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Error::ChannelNotFound => "channel not found",
            Error::ChannelAlreadyExists => "channel already exists",
            Error::ChannelFull => "channel buffer is full",
            Error::ChannelClosed => "channel is closed",
            Error::InvalidChannelName => "invalid channel name",
            Error::MessageTooLarge => "message too large",
            Error::InvalidMessage => "invalid message",
            Error::MessageCorrupted => "message corrupted",
            Error::ChecksumMismatch => "checksum mismatch",
            Error::OutOfMemory => "out of memory",
            Error::MappingFailed => "memory mapping failed",
            Error::InvalidMemoryLayout => "invalid memory layout",
            Error::PermissionDenied => "permission denied",
            Error::ResourceBusy => "resource busy",
            Error::InvalidOperation => "invalid operation",
            Error::VersionMismatch => "version mismatch",
            Error::IncompatibleProtocol => "incompatible protocol",
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_keep_their_groups() {
        assert_eq!(Error::ChannelNotFound.code(), 1000);
        assert_eq!(Error::MessageTooLarge.code(), 2000);
        assert_eq!(Error::InvalidMemoryLayout.code(), 3003);
        assert_eq!(Error::InvalidOperation.code(), 5003);
        assert_eq!(Error::VersionMismatch.code(), 6000);
    }

    #[test]
    fn test_display_is_stable() {
        assert_eq!(Error::ChannelFull.to_string(), "channel buffer is full");
    }
}
