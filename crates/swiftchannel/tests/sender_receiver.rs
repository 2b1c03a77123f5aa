//! Sender/receiver round trips over real platform shared memory.
//!
//! Channel names embed the test name and pid so parallel test runs never
//! collide; every test destroys its region on the way out.

#![cfg(unix)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use swiftchannel::prelude::*;
use swiftchannel::{flags, region_status, PlatformSharedMemory, SharedMemory};
use swiftchannel_shm::posix;

struct NamedRegion(String);

impl NamedRegion {
    fn new(tag: &str) -> Self {
        Self(format!("it_{}_{}", tag, std::process::id()))
    }

    fn name(&self) -> &str {
        &self.0
    }
}

impl Drop for NamedRegion {
    fn drop(&mut self) {
        let _ = posix::unlink(&self.0);
    }
}

fn config() -> ChannelConfig {
    ChannelConfig {
        ring_size: 64 * 1024,
        max_message_size: 1024,
        flags: flags::NO_CHECKSUM,
    }
}

#[test]
fn messages_cross_the_region_in_order() {
    let region = NamedRegion::new("order");
    let sender = Sender::create(region.name(), config()).unwrap();
    let receiver = Receiver::open(region.name(), config()).unwrap();

    for i in 0..100u32 {
        let mut payload = vec![0u8; 64];
        payload[..4].copy_from_slice(&i.to_le_bytes());
        sender.send(&payload).unwrap();
    }

    let mut next = 0u32;
    while next < 100 {
        let got = receiver
            .poll_one(|payload| {
                let i = u32::from_le_bytes(payload[..4].try_into().unwrap());
                assert_eq!(i, next);
            })
            .unwrap();
        assert!(got, "ring drained early at message {next}");
        next += 1;
    }
}

#[test]
fn receiver_before_sender_is_not_found() {
    let region = NamedRegion::new("norecv");
    let err = Receiver::open(region.name(), config());
    assert!(matches!(err, Err(Error::ChannelNotFound)));
}

#[test]
fn invalid_names_never_reach_the_os() {
    let err = Sender::create("no/slashes", config());
    assert!(matches!(err, Err(Error::InvalidChannelName)));
    let err = Receiver::open("", config());
    assert!(matches!(err, Err(Error::InvalidChannelName)));
}

#[test]
fn background_receiver_drains_a_concurrent_sender() {
    let region = NamedRegion::new("threads");
    let stats = Arc::new(ChannelStats::new());
    let sender = Sender::create(region.name(), config()).unwrap();
    let receiver = Receiver::with_observer(region.name(), config(), stats.clone()).unwrap();

    const MESSAGES: u32 = 5_000;
    let seen = Arc::new(AtomicU32::new(0));
    let seen_in_handler = Arc::clone(&seen);
    let mut expected = 0u32;
    receiver
        .spawn(move |payload| {
            let i = u32::from_le_bytes(payload[..4].try_into().unwrap());
            assert_eq!(i, expected, "out-of-order delivery");
            expected += 1;
            seen_in_handler.store(expected, Ordering::Release);
        })
        .unwrap();
    assert!(receiver.is_running());

    for i in 0..MESSAGES {
        let mut payload = vec![0u8; 16 + (i as usize % 200)];
        payload[..4].copy_from_slice(&i.to_le_bytes());
        loop {
            match sender.send(&payload) {
                Ok(()) => break,
                Err(Error::ChannelFull) => std::thread::yield_now(),
                Err(err) => panic!("send failed: {err}"),
            }
        }
    }

    // Wait for the worker to drain everything, then stop it.
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while seen.load(Ordering::Acquire) < MESSAGES {
        assert!(std::time::Instant::now() < deadline, "receiver stalled");
        std::thread::yield_now();
    }
    receiver.stop();
    assert!(!receiver.is_running());

    let snap = stats.snapshot();
    assert_eq!(snap.messages_received, u64::from(MESSAGES));
}

#[test]
fn observer_counts_sends_and_full_events() {
    let region = NamedRegion::new("stats");
    let small = ChannelConfig {
        ring_size: 4096,
        ..config()
    };
    let stats = Arc::new(ChannelStats::new());
    let sender = Sender::with_observer(region.name(), small, stats.clone()).unwrap();

    let payload = [1u8; 256];
    while sender.try_send(&payload) {}

    let snap = stats.snapshot();
    assert_eq!(snap.messages_sent, 14);
    assert_eq!(snap.bytes_sent, 14 * 256);
    assert_eq!(snap.send_errors, 1);
    assert_eq!(snap.buffer_full_events, 1);
}

#[test]
fn region_status_reflects_live_indices() {
    let region = NamedRegion::new("status");
    let sender = Sender::create(region.name(), config()).unwrap();
    sender.send(&[0u8; 100]).unwrap();

    let shm = PlatformSharedMemory::create_or_open(region.name(), 0, false).unwrap();
    // SAFETY: the mapping covers the whole region.
    let status = unsafe { region_status(shm.as_ptr(), shm.len()) }.unwrap();
    assert_eq!(status.ring_size, 64 * 1024);
    assert_eq!(status.write_index, 32 + 104);
    assert_eq!(status.read_index, 0);
    assert_eq!(status.sender_id, std::process::id());
}

#[test]
fn checksummed_channel_roundtrips() {
    let region = NamedRegion::new("crc");
    let checked = ChannelConfig {
        flags: 0,
        ..config()
    };
    let sender = Sender::create(region.name(), checked).unwrap();
    let receiver = Receiver::open(region.name(), checked).unwrap();

    sender.send(b"verified end to end").unwrap();
    let mut delivered = Vec::new();
    assert!(receiver.poll_one(|p| delivered = p.to_vec()).unwrap());
    assert_eq!(delivered, b"verified end to end");
}
