//! Oracle-checked model of a full channel pair.
//!
//! Runs a sender-side and a receiver-side [`Channel`] over one heap region
//! and verifies that delivered payloads are exactly the prefix of accepted
//! sends, in order, with oversize sends rejected without side effects.

use std::collections::VecDeque;

use swiftchannel_core::{
    flags, region_size, Channel, ChannelConfig, Error, ReadOutcome, RingBuffer,
};

/// Operations the fuzzer can drive against the pair.
#[derive(Clone, Copy, Debug)]
pub enum ChannelOp {
    /// Send a payload of this many bytes. Lengths beyond the configured
    /// maximum exercise the oversize rejection path.
    Send(u16),
    /// Receive one message.
    Recv,
}

/// Heap-backed stand-in for a mapped region.
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
}

impl Drop for Region {
    fn drop(&mut self) {
        // SAFETY: allocated with this layout.
        unsafe { std::alloc::dealloc(self.ptr, self.layout) };
    }
}

/// Run a full operation sequence against a channel pair.
pub fn execute_and_verify(config: &ChannelConfig, ops: &[ChannelOp]) -> Result<(), String> {
    let region = Region::new(region_size(config.ring_size));
    // SAFETY: the region outlives both channels and is used by exactly one
    // producer and one consumer.
    let tx = unsafe { Channel::for_sender(region.ptr, region.layout.size(), config) }
        .map_err(|e| format!("sender attach failed: {e}"))?;
    let rx = unsafe { Channel::for_receiver(region.ptr, region.layout.size(), config) }
        .map_err(|e| format!("receiver attach failed: {e}"))?;

    let mut oracle: VecDeque<Vec<u8>> = VecDeque::new();
    let mut fill = 0u8;
    let mut out = vec![0u8; config.max_message_size as usize];

    for (step, op) in ops.iter().enumerate() {
        match *op {
            ChannelOp::Send(len) => {
                fill = fill.wrapping_add(1);
                let payload: Vec<u8> =
                    (0..len as usize).map(|i| fill.wrapping_add(i as u8)).collect();
                let before = tx.free_space();

                match tx.send(&payload) {
                    Ok(()) => {
                        let frame = RingBuffer::frame_size(len as u32);
                        if tx.free_space() != before - frame {
                            return Err(format!(
                                "step {step}: free_space dropped by {} not {frame}",
                                before - tx.free_space()
                            ));
                        }
                        oracle.push_back(payload);
                    }
                    Err(Error::MessageTooLarge) => {
                        if len as u32 <= config.max_message_size {
                            return Err(format!(
                                "step {step}: {len}-byte payload rejected as oversize"
                            ));
                        }
                        if tx.free_space() != before {
                            return Err(format!("step {step}: oversize send mutated the ring"));
                        }
                    }
                    Err(Error::ChannelFull) => {
                        if len as u32 > config.max_message_size {
                            return Err(format!(
                                "step {step}: oversize payload reported as full"
                            ));
                        }
                        if tx.free_space() != before {
                            return Err(format!("step {step}: full send mutated the ring"));
                        }
                    }
                    Err(e) => return Err(format!("step {step}: unexpected send error {e}")),
                }
            }
            ChannelOp::Recv => match rx.recv(&mut out) {
                Ok(ReadOutcome::Delivered { len }) => {
                    let expected = oracle
                        .pop_front()
                        .ok_or_else(|| format!("step {step}: delivery from empty oracle"))?;
                    if out[..len] != expected[..] {
                        return Err(format!("step {step}: delivered payload differs"));
                    }
                }
                Ok(ReadOutcome::Empty) => {
                    if !oracle.is_empty() {
                        return Err(format!(
                            "step {step}: channel empty but oracle holds {} messages",
                            oracle.len()
                        ));
                    }
                }
                Ok(other) => return Err(format!("step {step}: unexpected outcome {other:?}")),
                Err(e) => return Err(format!("step {step}: unexpected recv error {e}")),
            },
        }
    }

    // Drain what is left; everything the oracle holds must still arrive.
    while let Some(expected) = oracle.pop_front() {
        match rx.recv(&mut out) {
            Ok(ReadOutcome::Delivered { len }) => {
                if out[..len] != expected[..] {
                    return Err("drain: delivered payload differs".into());
                }
            }
            other => return Err(format!("drain: expected delivery, got {other:?}")),
        }
    }
    match rx.recv(&mut out) {
        Ok(ReadOutcome::Empty) => Ok(()),
        other => Err(format!("drain: expected empty channel, got {other:?}")),
    }
}

/// Configuration used by the harnesses: small ring, checksums on, so both
/// the CRC path and wrap-arounds get constant exercise.
pub fn fuzz_config() -> ChannelConfig {
    ChannelConfig {
        ring_size: 4096,
        max_message_size: 1024,
        flags: 0,
    }
}

/// Same geometry with checksums off.
pub fn fuzz_config_no_checksum() -> ChannelConfig {
    ChannelConfig {
        flags: flags::NO_CHECKSUM,
        ..fuzz_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_traffic_with_oversize_and_full() {
        let mut ops = Vec::new();
        for i in 0..200u16 {
            ops.push(ChannelOp::Send((i * 37) % 1500));
            if i % 3 == 0 {
                ops.push(ChannelOp::Recv);
            }
        }
        execute_and_verify(&fuzz_config(), &ops).unwrap();
        execute_and_verify(&fuzz_config_no_checksum(), &ops).unwrap();
    }

    #[test]
    fn test_recv_heavy_traffic() {
        let ops = vec![
            ChannelOp::Recv,
            ChannelOp::Send(10),
            ChannelOp::Recv,
            ChannelOp::Recv,
            ChannelOp::Send(1024),
            ChannelOp::Send(1025),
            ChannelOp::Recv,
        ];
        execute_and_verify(&fuzz_config(), &ops).unwrap();
    }
}
