//! Inspect a live channel region.
//!
//! Attaches to a named region without joining either side of the channel
//! and prints its control header: version, ring geometry, indices and the
//! attached process ids.
//!
//! Run with: `cargo run --example inspector -p swiftchannel -- <channel_name>`

use swiftchannel::{region_status, ChannelConfig, PlatformSharedMemory, SharedMemory, PROTOCOL_VERSION};
use swiftchannel_core::{region_size, MESSAGE_HEADER_SIZE, SHARED_HEADER_SIZE};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let name = match std::env::args().nth(1) {
        Some(name) => name,
        None => {
            eprintln!("usage: inspector <channel_name>");
            std::process::exit(1);
        }
    };

    println!("SwiftChannel inspector");
    println!("  protocol version:    {PROTOCOL_VERSION}");
    println!("  shared header size:  {SHARED_HEADER_SIZE} bytes");
    println!("  message header size: {MESSAGE_HEADER_SIZE} bytes");
    println!();

    // Map the region without attaching; the default geometry bounds the
    // mapped length on platforms that cannot discover it.
    let size = region_size(ChannelConfig::default().ring_size);
    let shm = PlatformSharedMemory::create_or_open(&name, size, false)?;

    // SAFETY: the mapping covers `shm.len()` valid bytes.
    let status = unsafe { region_status(shm.as_ptr(), shm.len()) }?;
    println!("channel '{name}': {status}");
    Ok(())
}
