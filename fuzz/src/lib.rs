//! Fuzzing harnesses for the SwiftChannel core.
//!
//! The models run the real ring and channel code over heap-backed regions
//! (no OS shared memory involved) and check every operation against a plain
//! in-memory oracle.

pub mod channel_model;
pub mod frame_ring_model;
