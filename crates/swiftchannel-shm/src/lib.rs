//! swiftchannel-shm: OS shared-memory regions for SwiftChannel.
//!
//! The protocol core consumes an already-mapped byte region; this crate is
//! the collaborator that produces one. Each platform implements
//! [`SharedMemory`] (create-or-open a named region, close it) and the
//! façade crate picks the implementation for the current target through
//! [`PlatformSharedMemory`].
//!
//! Channel names are plain ASCII identifiers; the platform layer decorates
//! them (`/swiftchannel_<name>` on POSIX, `Local\SwiftChannel_<name>` on
//! Windows). Region lifetime belongs to this crate: a fresh region comes
//! back zero-initialized, and dropping the handle unmaps without destroying
//! the underlying object.

use swiftchannel_core::{Error, Result};

#[cfg(unix)]
pub mod posix;
#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub use posix::PosixSharedMemory;
#[cfg(windows)]
pub use windows::WindowsSharedMemory;

/// Shared-memory implementation for the current target.
#[cfg(unix)]
pub type PlatformSharedMemory = PosixSharedMemory;
/// Shared-memory implementation for the current target.
#[cfg(windows)]
pub type PlatformSharedMemory = WindowsSharedMemory;

/// A named, mapped shared-memory region.
///
/// Implementations map `size` zero-initialized bytes under a decorated name
/// and unmap on [`close`](SharedMemory::close) (also run on drop). Closing
/// never destroys the named object; destruction is a separate, owner-side
/// operation (e.g. [`posix::unlink`]).
pub trait SharedMemory: Sized {
    /// Map the region named `name`. With `create` set, the region is created
    /// when missing; without it, a missing region is
    /// [`Error::ChannelNotFound`].
    fn create_or_open(name: &str, size: usize, create: bool) -> Result<Self>;

    /// Unmap the region. Idempotent.
    fn close(&mut self);

    /// Base address of the mapping.
    fn as_ptr(&self) -> *mut u8;

    /// Mapped length in bytes.
    fn len(&self) -> usize;

    /// Whether the mapping is still live.
    fn is_open(&self) -> bool {
        !self.as_ptr().is_null()
    }
}

/// Maximum accepted channel-name length in bytes.
pub const MAX_NAME_LEN: usize = 128;

/// Check that `name` is a plain ASCII identifier usable on every platform.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidChannelName);
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(Error::InvalidChannelName);
    }
    Ok(())
}
