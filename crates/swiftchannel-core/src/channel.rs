//! Binding of a mapped region to its header and ring.
//!
//! A [`Channel`] is the in-process view of one region: it validates the
//! region on attach, runs the handshake for its role, and then forwards
//! sends and receives to the ring. It borrows the mapped bytes: the
//! mapping's lifetime belongs to the shared-memory collaborator, and
//! [`Channel::close`] releases only in-process state.

use std::ptr::NonNull;
use std::sync::atomic::Ordering;

use crate::config::{validate_flags, ChannelConfig};
use crate::error::{Error, Result};
use crate::handshake;
use crate::layout::{region_size, ring_offset, SharedHeader, MAGIC, SHARED_HEADER_SIZE};
use crate::ring::{ReadOutcome, RingBuffer};
use crate::version::Version;

enum Role {
    Sender,
    Receiver,
}

/// One attached end of a channel.
pub struct Channel {
    header: NonNull<SharedHeader>,
    ring: RingBuffer,
    max_message_size: u32,
    checksum: bool,
    open: bool,
}

// SAFETY: a Channel may move to another thread; concurrent use from two
// threads is excluded by the SPSC contract documented on the constructors.
unsafe impl Send for Channel {}

impl Channel {
    /// Attach to `region` as the producer, initializing it when fresh.
    ///
    /// # Safety
    ///
    /// - `region` must point to `len` valid, cache-line-aligned bytes that
    ///   stay mapped for the channel's lifetime.
    /// - The region must be zero-initialized when fresh.
    /// - At most one live producer channel per region.
    pub unsafe fn for_sender(region: *mut u8, len: usize, config: &ChannelConfig) -> Result<Self> {
        unsafe { Self::attach(region, len, config, Role::Sender) }
    }

    /// Attach to `region` as the consumer. Fails with
    /// [`Error::ChannelNotFound`] when the region is still uninitialized.
    ///
    /// # Safety
    ///
    /// Same contract as [`Channel::for_sender`], with at most one live
    /// consumer channel per region.
    pub unsafe fn for_receiver(region: *mut u8, len: usize, config: &ChannelConfig) -> Result<Self> {
        unsafe { Self::attach(region, len, config, Role::Receiver) }
    }

    unsafe fn attach(region: *mut u8, len: usize, config: &ChannelConfig, role: Role) -> Result<Self> {
        config.validate()?;
        if region.is_null() || len < SHARED_HEADER_SIZE {
            return Err(Error::InvalidMemoryLayout);
        }
        debug_assert_eq!(region as usize % crate::layout::CACHE_LINE_SIZE, 0);

        let header_ptr = region as *mut SharedHeader;
        let header_nn = NonNull::new(header_ptr).ok_or(Error::InvalidMemoryLayout)?;

        // The exclusive borrow taken by `initialize` must end before any
        // longer-lived shared reference to the header exists.
        match role {
            Role::Sender => {
                // SAFETY: caller guarantees `region` points to at least a
                // header's worth of valid, aligned bytes.
                let magic = unsafe { &*header_ptr }.magic.load(Ordering::Acquire);
                if magic == 0 {
                    if len < region_size(config.ring_size) {
                        return Err(Error::InvalidMemoryLayout);
                    }
                    // SAFETY: the region is fresh (magic still zero) and this
                    // process is its only toucher until magic is published.
                    handshake::initialize(
                        unsafe { &mut *header_ptr },
                        config.ring_size,
                        config.flags,
                    );
                } else {
                    // SAFETY: as above.
                    handshake::sender_attach(unsafe { &*header_ptr })?;
                }
            }
            // SAFETY: as above.
            Role::Receiver => handshake::receiver_attach(unsafe { &*header_ptr })?,
        }

        // The header is authoritative from here: a peer may have initialized
        // the region with a different (still valid) configuration.
        // SAFETY: initialization is over; from now on the header is only read
        // through shared references, and the peer only touches atomic fields.
        let header = unsafe { &*header_ptr };
        let ring_size = header.ring_size;
        let flags = header.flags;
        validate_flags(flags)?;
        if len < region_size(ring_size) {
            return Err(Error::InvalidMemoryLayout);
        }
        // The largest configured frame must keep fitting half the actual ring.
        if config.max_frame_size() > ring_size / 2 {
            return Err(Error::InvalidOperation);
        }

        // SAFETY: `region + ring_offset()` begins `ring_size` valid bytes
        // (length checked above); ring_size is a validated power of two.
        let ring = unsafe { RingBuffer::from_raw(region.add(ring_offset()), ring_size) };

        Ok(Self {
            header: header_nn,
            ring,
            max_message_size: config.max_message_size,
            checksum: flags & crate::layout::flags::NO_CHECKSUM == 0,
            open: true,
        })
    }

    #[inline]
    fn header(&self) -> &SharedHeader {
        // SAFETY: the caller of the constructor keeps the mapping alive for
        // the channel's lifetime, and `close` only flips the `open` flag.
        unsafe { self.header.as_ref() }
    }

    /// Append one message. Producer side only.
    pub fn send(&self, payload: &[u8]) -> Result<()> {
        if !self.open {
            return Err(Error::ChannelClosed);
        }
        if payload.len() > self.max_message_size as usize {
            return Err(Error::MessageTooLarge);
        }
        if self.ring.try_write(self.header(), payload, self.checksum) {
            Ok(())
        } else {
            Err(Error::ChannelFull)
        }
    }

    /// Consume one message into `out`. Consumer side only.
    ///
    /// Transient conditions come back as [`ReadOutcome`]; corruption is an
    /// error and leaves the region untouched so the caller can tear it down.
    pub fn recv(&self, out: &mut [u8]) -> Result<ReadOutcome> {
        if !self.open {
            return Err(Error::ChannelClosed);
        }
        match self.ring.try_read(self.header(), out, self.checksum) {
            ReadOutcome::Corrupt => Err(Error::MessageCorrupted),
            ReadOutcome::ChecksumMismatch => Err(Error::ChecksumMismatch),
            outcome => Ok(outcome),
        }
    }

    /// Bytes currently free for writing. Advisory.
    pub fn free_space(&self) -> u64 {
        if !self.open {
            return 0;
        }
        self.ring.free_space(self.header())
    }

    /// Bytes currently occupied by unread frames. Advisory.
    pub fn occupied(&self) -> u64 {
        if !self.open {
            return 0;
        }
        self.ring.occupied(self.header())
    }

    /// Largest accepted payload.
    #[inline]
    pub fn max_message_size(&self) -> u32 {
        self.max_message_size
    }

    /// Whether payload checksums are computed and verified on this channel.
    #[inline]
    pub fn checksum_enabled(&self) -> bool {
        self.checksum
    }

    /// Whether the handle is usable.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Release the in-process binding. Idempotent; the mapping itself stays
    /// with its owner.
    pub fn close(&mut self) {
        self.open = false;
    }
}

/// Snapshot of a region's control header, for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct RegionStatus {
    /// Protocol version the region was initialized with.
    pub version: Version,
    /// Ring capacity in bytes.
    pub ring_size: u64,
    /// Absolute write index at snapshot time.
    pub write_index: u64,
    /// Absolute read index at snapshot time.
    pub read_index: u64,
    /// Producer process id, 0 if none attached yet.
    pub sender_id: u32,
    /// Consumer process id, 0 if none attached yet.
    pub receiver_id: u32,
    /// Flag bits.
    pub flags: u64,
}

impl RegionStatus {
    /// Unread bytes at snapshot time.
    pub fn occupied(&self) -> u64 {
        self.write_index - self.read_index
    }
}

impl std::fmt::Display for RegionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "v{} ring={} w={} r={} occupied={}/{} ({}%) sender={} receiver={} flags={:#x}",
            self.version,
            self.ring_size,
            self.write_index,
            self.read_index,
            self.occupied(),
            self.ring_size,
            if self.ring_size > 0 {
                self.occupied() * 100 / self.ring_size
            } else {
                0
            },
            self.sender_id,
            self.receiver_id,
            self.flags,
        )
    }
}

/// Validate a mapped region and snapshot its header without attaching.
///
/// # Safety
///
/// `region` must point to `len` valid bytes of a mapped channel region.
pub unsafe fn region_status(region: *const u8, len: usize) -> Result<RegionStatus> {
    if region.is_null() || len < SHARED_HEADER_SIZE {
        return Err(Error::InvalidMemoryLayout);
    }
    // SAFETY: length checked; the header is read through shared reference
    // and atomic loads only.
    let header = unsafe { &*(region as *const SharedHeader) };
    if header.magic.load(Ordering::Acquire) != MAGIC {
        return Err(Error::ChannelNotFound);
    }
    handshake::validate(header)?;
    Ok(RegionStatus {
        version: Version::unpack(header.version),
        ring_size: header.ring_size,
        write_index: header.write_index.load(Ordering::Acquire),
        read_index: header.read_index.load(Ordering::Acquire),
        sender_id: header.sender_id.load(Ordering::Relaxed),
        receiver_id: header.receiver_id.load(Ordering::Relaxed),
        flags: header.flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::flags;

    /// Heap-backed stand-in for a mapped region, cache-line aligned and
    /// zero-initialized like a fresh mapping.
    pub(crate) struct FakeRegion {
        ptr: *mut u8,
        layout: std::alloc::Layout,
    }

    impl FakeRegion {
        pub(crate) fn new(len: usize) -> Self {
            let layout = std::alloc::Layout::from_size_align(len, 64).unwrap();
            // SAFETY: layout has non-zero size in every test.
            let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
            assert!(!ptr.is_null());
            Self { ptr, layout }
        }

        pub(crate) fn ptr(&self) -> *mut u8 {
            self.ptr
        }

        pub(crate) fn len(&self) -> usize {
            self.layout.size()
        }
    }

    impl Drop for FakeRegion {
        fn drop(&mut self) {
            // SAFETY: allocated with the stored layout in `new`.
            unsafe { std::alloc::dealloc(self.ptr, self.layout) };
        }
    }

    fn small_config() -> ChannelConfig {
        ChannelConfig {
            ring_size: 4096,
            max_message_size: 1024,
            flags: flags::NO_CHECKSUM,
        }
    }

    #[test]
    fn test_sender_initializes_fresh_region() {
        let region = FakeRegion::new(region_size(4096));
        let ch = unsafe { Channel::for_sender(region.ptr(), region.len(), &small_config()) }.unwrap();
        assert!(ch.is_open());
        assert_eq!(ch.free_space(), 4096);

        let status = unsafe { region_status(region.ptr(), region.len()) }.unwrap();
        assert_eq!(status.ring_size, 4096);
        assert_eq!(status.sender_id, std::process::id());
    }

    #[test]
    fn test_receiver_requires_initialized_region() {
        let region = FakeRegion::new(region_size(4096));
        let err = unsafe { Channel::for_receiver(region.ptr(), region.len(), &small_config()) };
        assert_eq!(err.err(), Some(Error::ChannelNotFound));

        unsafe { Channel::for_sender(region.ptr(), region.len(), &small_config()) }.unwrap();
        unsafe { Channel::for_receiver(region.ptr(), region.len(), &small_config()) }.unwrap();
    }

    #[test]
    fn test_undersized_region_refused() {
        let region = FakeRegion::new(2048);
        let err = unsafe { Channel::for_sender(region.ptr(), region.len(), &small_config()) };
        assert_eq!(err.err(), Some(Error::InvalidMemoryLayout));
    }

    #[test]
    fn test_receiver_adopts_header_ring_size() {
        // Sender creates with an 8 KiB ring; receiver arrives configured for
        // 4 KiB but maps the full region. The header wins.
        let big = ChannelConfig { ring_size: 8192, ..small_config() };
        let region = FakeRegion::new(region_size(8192));
        let tx = unsafe { Channel::for_sender(region.ptr(), region.len(), &big) }.unwrap();
        let rx = unsafe { Channel::for_receiver(region.ptr(), region.len(), &small_config()) }.unwrap();

        tx.send(&[9u8; 1000]).unwrap();
        let mut out = [0u8; 1024];
        assert_eq!(rx.recv(&mut out).unwrap(), ReadOutcome::Delivered { len: 1000 });
        assert_eq!(rx.free_space(), 8192);
    }

    #[test]
    fn test_oversize_send_has_no_side_effect() {
        let region = FakeRegion::new(region_size(4096));
        let ch = unsafe { Channel::for_sender(region.ptr(), region.len(), &small_config()) }.unwrap();
        assert_eq!(ch.send(&[0u8; 1025]), Err(Error::MessageTooLarge));
        assert_eq!(ch.free_space(), 4096);
    }

    #[test]
    fn test_close_is_idempotent() {
        let region = FakeRegion::new(region_size(4096));
        let mut ch =
            unsafe { Channel::for_sender(region.ptr(), region.len(), &small_config()) }.unwrap();
        ch.close();
        assert!(!ch.is_open());
        ch.close();
        assert!(!ch.is_open());
        assert_eq!(ch.send(b"x"), Err(Error::ChannelClosed));
    }

    #[test]
    fn test_status_of_uninitialized_region() {
        let region = FakeRegion::new(region_size(4096));
        let err = unsafe { region_status(region.ptr(), region.len()) };
        assert_eq!(err.err(), Some(Error::ChannelNotFound));
    }
}
