//! Lock-free SPSC framed byte ring.
//!
//! The ring holds self-framing messages: a 32-byte [`MessageHeader`]
//! followed by the payload padded to 8 bytes. Both indices live in the
//! [`SharedHeader`] and are absolute byte counters; a position inside the
//! ring is `index & (ring_size - 1)`. Copies that straddle the physical end
//! of the buffer are split in two.
//!
//! Synchronization is a single acquire/release pair per direction: the
//! producer's release store of `write_index` publishes all frame bytes
//! written before it, and the consumer's release store of `read_index`
//! returns the consumed span to the producer. There are no other fences.

use std::sync::atomic::Ordering;

use crate::layout::{align_up, MessageHeader, SharedHeader, MAGIC, MESSAGE_HEADER_SIZE, PAYLOAD_ALIGN};

/// Outcome of a [`RingBuffer::try_read`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// No unread frame.
    Empty,
    /// A payload of `len` bytes was copied into the caller's buffer.
    Delivered {
        /// Payload length in bytes.
        len: usize,
    },
    /// The caller's buffer is smaller than the pending payload. Nothing was
    /// consumed; retry with at least `required` bytes.
    BufferTooSmall {
        /// Payload length of the pending frame.
        required: usize,
    },
    /// The frame at the read position is not a valid frame. Nothing was
    /// consumed, and nothing ever will be: the stream is no longer
    /// self-framing and the region must be torn down.
    Corrupt,
    /// The frame's payload CRC-32 does not match its header. Fatal, like
    /// [`ReadOutcome::Corrupt`].
    ChecksumMismatch,
}

/// View of the ring bytes of a channel region.
///
/// The ring does not own the bytes and holds no state of its own besides the
/// capacity; all shared state lives in the [`SharedHeader`] passed to each
/// call. One thread may write and one thread may read, concurrently.
pub struct RingBuffer {
    buf: *mut u8,
    size: u64,
    mask: u64,
}

// SAFETY: the producer writes only to the free span and the consumer reads
// only the published span; the two never alias an in-progress frame because
// `write_index` is the single publication point.
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// Create a ring view over `size` bytes at `buf`.
    ///
    /// # Safety
    ///
    /// - `buf` must point to `size` valid bytes that outlive this view.
    /// - `size` must be a non-zero power of two.
    /// - At most one thread may call [`try_write`](Self::try_write) and at
    ///   most one may call [`try_read`](Self::try_read), each paired with
    ///   the same `SharedHeader`.
    pub unsafe fn from_raw(buf: *mut u8, size: u64) -> Self {
        debug_assert!(size.is_power_of_two());
        Self {
            buf,
            size,
            mask: size - 1,
        }
    }

    /// Ring capacity in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Total bytes a payload of `len` bytes occupies in the ring.
    #[inline]
    pub fn frame_size(len: u32) -> u64 {
        MESSAGE_HEADER_SIZE as u64 + align_up(len as u64, PAYLOAD_ALIGN)
    }

    /// Try to append one frame. Wait-free; returns `false` when the ring has
    /// no room, with no visible change to the region.
    pub fn try_write(&self, header: &SharedHeader, payload: &[u8], with_checksum: bool) -> bool {
        let frame = Self::frame_size(payload.len() as u32);

        let w = header.write_index.load(Ordering::Relaxed);
        let r = header.read_index.load(Ordering::Acquire);
        if self.size - (w - r) < frame {
            return false;
        }

        let msg = MessageHeader {
            magic: MAGIC,
            size: payload.len() as u32,
            sequence: w,
            timestamp: monotonic_ns(),
            checksum: if with_checksum { crc32fast::hash(payload) } else { 0 },
            reserved: 0,
        };

        // SAFETY: the span [w, w + frame) is unpublished and inside the free
        // region checked above; only this (sole producer) thread touches it.
        unsafe {
            self.copy_in(w, &msg.encode());
            self.copy_in(w + MESSAGE_HEADER_SIZE as u64, payload);
        }

        // Single publication point for the whole frame.
        header.write_index.store(w + frame, Ordering::Release);
        true
    }

    /// Try to consume one frame into `out`. Wait-free.
    ///
    /// Corruption outcomes never advance `read_index`; subsequent reads keep
    /// returning the same outcome.
    pub fn try_read(&self, header: &SharedHeader, out: &mut [u8], verify_checksum: bool) -> ReadOutcome {
        let r = header.read_index.load(Ordering::Relaxed);
        let w = header.write_index.load(Ordering::Acquire);
        if r >= w {
            return ReadOutcome::Empty;
        }

        let mut scratch = [0u8; MESSAGE_HEADER_SIZE];
        // SAFETY: [r, w) is published by the producer's release store and
        // holds at least one whole frame, so 32 header bytes are readable.
        unsafe { self.copy_out(r, &mut scratch) };
        let msg = MessageHeader::decode(&scratch);

        if msg.magic != MAGIC {
            return ReadOutcome::Corrupt;
        }
        // A size the ring cannot hold means the length field itself is
        // garbage; don't trust it to bound any further reads.
        if Self::frame_size(msg.size) > self.size {
            return ReadOutcome::Corrupt;
        }

        let payload_at = r + MESSAGE_HEADER_SIZE as u64;
        if verify_checksum {
            // SAFETY: payload bytes are inside the published span.
            let crc = unsafe { self.crc32_at(payload_at, msg.size as usize) };
            if crc != msg.checksum {
                return ReadOutcome::ChecksumMismatch;
            }
        }

        let len = msg.size as usize;
        if len > out.len() {
            return ReadOutcome::BufferTooSmall { required: len };
        }

        // SAFETY: as above; `len` bytes starting at `payload_at` are
        // published and `out` has room for them.
        unsafe { self.copy_out(payload_at, &mut out[..len]) };

        header
            .read_index
            .store(r + Self::frame_size(msg.size), Ordering::Release);
        ReadOutcome::Delivered { len }
    }

    /// Bytes currently free for writing, as seen by the producer. Advisory:
    /// may be stale by the time it is used, but never over-reports (the
    /// consumer only ever frees more).
    pub fn free_space(&self, header: &SharedHeader) -> u64 {
        let w = header.write_index.load(Ordering::Relaxed);
        let r = header.read_index.load(Ordering::Acquire);
        self.size - (w - r)
    }

    /// Bytes currently occupied, as seen by the consumer. Advisory.
    pub fn occupied(&self, header: &SharedHeader) -> u64 {
        let r = header.read_index.load(Ordering::Relaxed);
        let w = header.write_index.load(Ordering::Acquire);
        w - r
    }

    /// Copy `src` into the ring at absolute index `index`, splitting at the
    /// physical boundary.
    ///
    /// # Safety
    ///
    /// The destination span must be owned by the caller per the SPSC
    /// protocol (unpublished, inside the free region).
    unsafe fn copy_in(&self, index: u64, src: &[u8]) {
        let pos = (index & self.mask) as usize;
        let first = src.len().min(self.size as usize - pos);
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), self.buf.add(pos), first);
            if first < src.len() {
                std::ptr::copy_nonoverlapping(src.as_ptr().add(first), self.buf, src.len() - first);
            }
        }
    }

    /// Copy from the ring at absolute index `index` into `dst`, splitting at
    /// the physical boundary.
    ///
    /// # Safety
    ///
    /// The source span must be published (inside `[read_index, write_index)`).
    unsafe fn copy_out(&self, index: u64, dst: &mut [u8]) {
        let pos = (index & self.mask) as usize;
        let first = dst.len().min(self.size as usize - pos);
        unsafe {
            std::ptr::copy_nonoverlapping(self.buf.add(pos), dst.as_mut_ptr(), first);
            if first < dst.len() {
                std::ptr::copy_nonoverlapping(self.buf, dst.as_mut_ptr().add(first), dst.len() - first);
            }
        }
    }

    /// CRC-32 of `len` ring bytes starting at absolute index `index`,
    /// without copying them out.
    ///
    /// # Safety
    ///
    /// The span must be published, as for [`copy_out`](Self::copy_out).
    unsafe fn crc32_at(&self, index: u64, len: usize) -> u32 {
        let pos = (index & self.mask) as usize;
        let first = len.min(self.size as usize - pos);
        let mut hasher = crc32fast::Hasher::new();
        unsafe {
            hasher.update(std::slice::from_raw_parts(self.buf.add(pos), first));
            if first < len {
                hasher.update(std::slice::from_raw_parts(self.buf, len - first));
            }
        }
        hasher.finalize()
    }
}

/// Steady-clock reading in nanoseconds. The epoch is unspecified; values are
/// only meaningful relative to other reads on the same host.
#[cfg(unix)]
fn monotonic_ns() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid out-pointer; CLOCK_MONOTONIC is always
    // available on the supported platforms.
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}

#[cfg(not(unix))]
fn monotonic_ns() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
}
