//! Oracle-checked model of the framed SPSC ring.
//!
//! Each operation runs against the real [`RingBuffer`] over a heap region
//! and, in parallel, against a `VecDeque` oracle. After every step the
//! shared indices are compared with what the oracle predicts.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;

use swiftchannel_core::{handshake, flags, ReadOutcome, RingBuffer, SharedHeader};

/// Smallest ring exercised by the fuzzer.
pub const MIN_RING_SIZE: u64 = 4096;
/// Largest ring exercised by the fuzzer (small keeps wrap-arounds frequent).
pub const MAX_RING_SIZE: u64 = 16384;

/// Operations the fuzzer can drive.
#[derive(Clone, Copy, Debug)]
pub enum RingOp {
    /// Write a payload of this many bytes (clamped to the model's maximum).
    Write(u16),
    /// Read one frame.
    Read,
}

/// The real ring plus its oracle.
pub struct FrameRingModel {
    header: Box<SharedHeader>,
    // Backing storage for `ring`; the heap allocation never moves.
    ring_bytes: Vec<u8>,
    ring: RingBuffer,
    max_message_size: u32,
    oracle: VecDeque<Vec<u8>>,
    /// Oracle's prediction of the absolute indices.
    expected_write: u64,
    expected_read: u64,
    fill: u8,
}

impl FrameRingModel {
    pub fn new(ring_size: u64, max_message_size: u32) -> Self {
        assert!(ring_size.is_power_of_two());
        // SAFETY: all-zero is a valid SharedHeader.
        let mut header: Box<SharedHeader> = unsafe { Box::new(std::mem::zeroed()) };
        handshake::initialize(&mut header, ring_size, flags::NO_CHECKSUM);
        let mut ring_bytes = vec![0u8; ring_size as usize];
        // SAFETY: the Vec provides `ring_size` valid bytes and its heap
        // allocation outlives the ring view inside this struct.
        let ring = unsafe { RingBuffer::from_raw(ring_bytes.as_mut_ptr(), ring_size) };
        Self {
            header,
            ring_bytes,
            ring,
            max_message_size,
            oracle: VecDeque::new(),
            expected_write: 0,
            expected_read: 0,
            fill: 0,
        }
    }

    fn next_payload(&mut self, len: usize) -> Vec<u8> {
        self.fill = self.fill.wrapping_add(1);
        let fill = self.fill;
        (0..len).map(|i| fill.wrapping_add(i as u8)).collect()
    }

    fn apply(&mut self, op: RingOp, step: usize) -> Result<(), String> {
        match op {
            RingOp::Write(len) => {
                let len = len as usize % (self.max_message_size as usize + 1);
                let payload = self.next_payload(len);
                let frame = RingBuffer::frame_size(len as u32);
                let fits =
                    self.ring.size() - (self.expected_write - self.expected_read) >= frame;

                let wrote = self.ring.try_write(&self.header, &payload, false);
                if wrote != fits {
                    return Err(format!(
                        "step {step}: try_write returned {wrote} but occupancy said fits={fits}"
                    ));
                }
                if wrote {
                    self.expected_write += frame;
                    self.oracle.push_back(payload);
                }
            }
            RingOp::Read => {
                let mut out = vec![0u8; self.max_message_size as usize];
                match self.ring.try_read(&self.header, &mut out, false) {
                    ReadOutcome::Delivered { len } => {
                        let expected = self.oracle.pop_front().ok_or_else(|| {
                            format!("step {step}: delivered a frame the oracle never wrote")
                        })?;
                        if out[..len] != expected[..] {
                            return Err(format!(
                                "step {step}: payload differs (len {len} vs {})",
                                expected.len()
                            ));
                        }
                        self.expected_read += RingBuffer::frame_size(len as u32);
                    }
                    ReadOutcome::Empty => {
                        if !self.oracle.is_empty() {
                            return Err(format!(
                                "step {step}: ring empty but oracle holds {} frames",
                                self.oracle.len()
                            ));
                        }
                    }
                    other => {
                        return Err(format!("step {step}: unexpected outcome {other:?}"));
                    }
                }
            }
        }
        self.check_invariants(step)
    }

    fn check_invariants(&self, step: usize) -> Result<(), String> {
        let w = self.header.write_index.load(Ordering::Acquire);
        let r = self.header.read_index.load(Ordering::Acquire);
        if w != self.expected_write || r != self.expected_read {
            return Err(format!(
                "step {step}: indices (w={w}, r={r}) != oracle (w={}, r={})",
                self.expected_write, self.expected_read
            ));
        }
        if w < r {
            return Err(format!("step {step}: write_index {w} < read_index {r}"));
        }
        if w - r > self.ring.size() {
            return Err(format!(
                "step {step}: occupancy {} exceeds capacity {}",
                w - r,
                self.ring.size()
            ));
        }
        let oracle_bytes: u64 = self
            .oracle
            .iter()
            .map(|p| RingBuffer::frame_size(p.len() as u32))
            .sum();
        if w - r != oracle_bytes {
            return Err(format!(
                "step {step}: occupancy {} != oracle bytes {oracle_bytes}",
                w - r
            ));
        }
        debug_assert_eq!(self.ring_bytes.len() as u64, self.ring.size());
        Ok(())
    }
}

/// Run a full operation sequence, panicking on the first broken invariant.
pub fn execute_and_verify(
    ring_size: u64,
    max_message_size: u32,
    ops: &[RingOp],
) -> Result<(), String> {
    let mut model = FrameRingModel::new(ring_size, max_message_size);
    for (step, op) in ops.iter().enumerate() {
        model.apply(*op, step)?;
    }
    Ok(())
}
