//! End-to-end channel behavior over heap-backed regions.
//!
//! Every test uses the same shape a real deployment has (a zeroed,
//! cache-line-aligned byte region) without touching OS shared memory.

use std::sync::atomic::Ordering;

use swiftchannel_core::{
    flags, region_size, region_status, ring_offset, Channel, ChannelConfig, Error, ReadOutcome,
    SharedHeader, Version,
};

/// Zeroed, 64-byte-aligned stand-in for a fresh mapping.
struct Region {
    ptr: *mut u8,
    layout: std::alloc::Layout,
}

impl Region {
    fn new(len: usize) -> Self {
        let layout = std::alloc::Layout::from_size_align(len, 64).unwrap();
        // SAFETY: non-zero size.
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        assert!(!ptr.is_null());
        Self { ptr, layout }
    }

    fn for_ring(ring_size: u64) -> Self {
        Self::new(region_size(ring_size))
    }

    fn len(&self) -> usize {
        self.layout.size()
    }

    fn header(&self) -> &SharedHeader {
        // SAFETY: the region starts with a SharedHeader once initialized;
        // reads go through atomics.
        unsafe { &*(self.ptr as *const SharedHeader) }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // SAFETY: allocated with this layout in `new`.
        unsafe { std::alloc::dealloc(self.ptr, self.layout) };
    }
}

fn config() -> ChannelConfig {
    ChannelConfig {
        ring_size: 4096,
        max_message_size: 1024,
        flags: flags::NO_CHECKSUM,
    }
}

fn pair(region: &Region) -> (Channel, Channel) {
    // SAFETY: region outlives both channels inside each test; one producer,
    // one consumer.
    let tx = unsafe { Channel::for_sender(region.ptr, region.len(), &config()) }.unwrap();
    let rx = unsafe { Channel::for_receiver(region.ptr, region.len(), &config()) }.unwrap();
    (tx, rx)
}

#[test]
fn first_message_roundtrips_and_advances_both_indices_by_one_frame() {
    let region = Region::for_ring(4096);
    let (tx, rx) = pair(&region);

    tx.send(&[0x41, 0x42, 0x43]).unwrap();
    let mut out = [0u8; 16];
    assert_eq!(rx.recv(&mut out).unwrap(), ReadOutcome::Delivered { len: 3 });
    assert_eq!(&out[..3], &[0x41, 0x42, 0x43]);

    // One frame: 32-byte header + 3 bytes padded to 8.
    let status = unsafe { region_status(region.ptr, region.len()) }.unwrap();
    assert_eq!(status.write_index, 40);
    assert_eq!(status.read_index, 40);
    assert_eq!(status.occupied(), 0);
}

#[test]
fn max_size_message_roundtrips() {
    let region = Region::for_ring(4096);
    let (tx, rx) = pair(&region);

    tx.send(&[0x41, 0x42, 0x43]).unwrap();
    let mut small = [0u8; 16];
    rx.recv(&mut small).unwrap();

    let payload = [0xFFu8; 1024];
    tx.send(&payload).unwrap();

    let mut out = [0u8; 1024];
    assert_eq!(rx.recv(&mut out).unwrap(), ReadOutcome::Delivered { len: 1024 });
    assert_eq!(out, payload);

    // The second frame began where the first ended.
    let status = unsafe { region_status(region.ptr, region.len()) }.unwrap();
    assert_eq!(status.write_index, 40 + 32 + 1024);
}

#[test]
fn ring_accepts_exactly_fourteen_256_byte_frames() {
    let region = Region::for_ring(4096);
    let (tx, _rx) = pair(&region);

    let payload = [7u8; 256];
    let mut accepted = 0;
    loop {
        match tx.send(&payload) {
            Ok(()) => accepted += 1,
            Err(Error::ChannelFull) => break,
            Err(e) => panic!("unexpected send error: {e}"),
        }
    }
    // Each frame is 288 bytes; 14 × 288 = 4032 fit, a 15th would not.
    assert_eq!(accepted, 14);
    assert_eq!(tx.free_space(), 4096 - 14 * 288);
}

#[test]
fn draining_one_frame_unblocks_a_failed_send() {
    let region = Region::for_ring(4096);
    let (tx, rx) = pair(&region);

    let payload: Vec<u8> = (0..256u32).map(|i| i as u8).collect();
    while tx.send(&payload).is_ok() {}
    assert_eq!(tx.send(&payload), Err(Error::ChannelFull));

    let mut out = [0u8; 256];
    assert_eq!(rx.recv(&mut out).unwrap(), ReadOutcome::Delivered { len: 256 });

    tx.send(&payload).unwrap();
    // Drain the rest and confirm the retried payload arrives intact, last.
    let mut last = Vec::new();
    while let ReadOutcome::Delivered { len } = rx.recv(&mut out).unwrap() {
        last = out[..len].to_vec();
    }
    assert_eq!(last, payload);
}

#[test]
fn send_free_space_accounting_matches_frame_sizes() {
    let region = Region::for_ring(4096);
    let (tx, _rx) = pair(&region);

    let mut expected = 4096u64;
    for len in [1usize, 7, 8, 9, 64, 100, 1024] {
        tx.send(&vec![0xA5u8; len]).unwrap();
        expected -= 32 + ((len as u64 + 7) & !7);
        assert_eq!(tx.free_space(), expected);
    }
}

#[test]
fn attach_fails_across_protocol_majors() {
    let region = Region::for_ring(4096);
    let mut tx = unsafe { Channel::for_sender(region.ptr, region.len(), &config()) }.unwrap();
    tx.close();

    // Rewrite the packed version as if a 2.0.0 peer had initialized it.
    // SAFETY: no live channel references the header while we poke it.
    unsafe {
        (*(region.ptr as *mut SharedHeader)).version = Version { major: 2, minor: 0, patch: 0 }.pack();
    }

    let err = unsafe { Channel::for_receiver(region.ptr, region.len(), &config()) };
    assert_eq!(err.err(), Some(Error::VersionMismatch));
    let err = unsafe { Channel::for_sender(region.ptr, region.len(), &config()) };
    assert_eq!(err.err(), Some(Error::VersionMismatch));
}

#[test]
fn attach_tolerates_minor_and_patch_drift() {
    let region = Region::for_ring(4096);
    let (mut tx, _rx) = pair(&region);
    tx.close();

    // SAFETY: as above.
    unsafe {
        (*(region.ptr as *mut SharedHeader)).version = Version { major: 1, minor: 3, patch: 9 }.pack();
    }
    unsafe { Channel::for_receiver(region.ptr, region.len(), &config()) }.unwrap();
}

#[test]
fn corrupted_frame_sentinel_is_fatal_and_sticky() {
    let region = Region::for_ring(4096);
    let (tx, rx) = pair(&region);

    tx.send(b"poisoned").unwrap();
    // Clobber the frame header's first byte in the ring.
    // SAFETY: in-bounds write; the producer published and is now quiet.
    unsafe { *region.ptr.add(ring_offset()) ^= 0xFF };

    let mut out = [0u8; 64];
    assert_eq!(rx.recv(&mut out), Err(Error::MessageCorrupted));
    assert_eq!(region.header().read_index.load(Ordering::Acquire), 0);
    // No resynchronization: the channel stays broken.
    assert_eq!(rx.recv(&mut out), Err(Error::MessageCorrupted));
}

#[test]
fn checksum_mismatch_surfaces_as_its_own_error() {
    let checked = ChannelConfig { flags: 0, ..config() };
    let region = Region::for_ring(4096);
    let tx = unsafe { Channel::for_sender(region.ptr, region.len(), &checked) }.unwrap();
    let rx = unsafe { Channel::for_receiver(region.ptr, region.len(), &checked) }.unwrap();

    tx.send(b"checked payload").unwrap();
    // Flip one payload byte (payload starts 32 bytes into the frame).
    // SAFETY: in-bounds write.
    unsafe { *region.ptr.add(ring_offset() + 32) ^= 0x01 };

    let mut out = [0u8; 64];
    assert_eq!(rx.recv(&mut out), Err(Error::ChecksumMismatch));
    assert_eq!(region.header().read_index.load(Ordering::Acquire), 0);
}

#[test]
fn small_receive_buffer_reports_required_size_and_keeps_the_frame() {
    let region = Region::for_ring(4096);
    let (tx, rx) = pair(&region);

    tx.send(&[3u8; 500]).unwrap();
    let mut out = [0u8; 100];
    assert_eq!(
        rx.recv(&mut out).unwrap(),
        ReadOutcome::BufferTooSmall { required: 500 }
    );
    assert_eq!(region.header().read_index.load(Ordering::Acquire), 0);

    let mut big = vec![0u8; 500];
    assert_eq!(rx.recv(&mut big).unwrap(), ReadOutcome::Delivered { len: 500 });
}

#[test]
fn concurrent_producer_and_consumer_preserve_order_and_content() {
    const MESSAGES: u32 = 20_000;

    let region = Region::for_ring(4096);
    let (tx, rx) = pair(&region);

    fn payload_for(i: u32) -> Vec<u8> {
        let len = 4 + (i as usize * 13) % 509;
        let mut p = vec![0u8; len];
        p[..4].copy_from_slice(&i.to_le_bytes());
        for (j, b) in p.iter_mut().enumerate().skip(4) {
            *b = (i as usize).wrapping_add(j) as u8;
        }
        p
    }

    std::thread::scope(|s| {
        s.spawn(move || {
            for i in 0..MESSAGES {
                let p = payload_for(i);
                loop {
                    match tx.send(&p) {
                        Ok(()) => break,
                        Err(Error::ChannelFull) => std::thread::yield_now(),
                        Err(e) => panic!("send failed: {e}"),
                    }
                }
            }
        });

        s.spawn(move || {
            let mut out = vec![0u8; 1024];
            let mut next = 0u32;
            while next < MESSAGES {
                match rx.recv(&mut out).unwrap() {
                    ReadOutcome::Delivered { len } => {
                        let expected = payload_for(next);
                        assert_eq!(&out[..len], &expected[..], "message {next} differs");
                        next += 1;
                    }
                    ReadOutcome::Empty => std::thread::yield_now(),
                    other => panic!("unexpected outcome: {other:?}"),
                }
            }
        });
    });

    let status = unsafe { region_status(region.ptr, region.len()) }.unwrap();
    assert_eq!(status.occupied(), 0);
    assert_eq!(status.write_index, status.read_index);
}
