//! Price-feed consumer.
//!
//! Opens the `price_feed` channel created by the `sender` example and polls
//! until 20 updates have arrived or the feed goes quiet for five seconds.
//!
//! Run with: `cargo run --example receiver -p swiftchannel`

use std::time::{Duration, Instant};

use swiftchannel::prelude::*;

fn decode(payload: &[u8]) -> Option<(u32, f64, f64, u64)> {
    if payload.len() != 28 {
        return None;
    }
    Some((
        u32::from_le_bytes(payload[0..4].try_into().ok()?),
        f64::from_le_bytes(payload[4..12].try_into().ok()?),
        f64::from_le_bytes(payload[12..20].try_into().ok()?),
        u64::from_le_bytes(payload[20..28].try_into().ok()?),
    ))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ChannelConfig {
        ring_size: 1024 * 1024,
        max_message_size: 4096,
        ..ChannelConfig::default()
    };

    // The sender may not have created the channel yet; retry briefly.
    let receiver = loop {
        match Receiver::open("price_feed", config) {
            Ok(r) => break r,
            Err(Error::ChannelNotFound) => std::thread::sleep(Duration::from_millis(100)),
            Err(err) => return Err(err),
        }
    };
    tracing::info!(name = receiver.name(), "receiver ready");

    let mut received = 0u32;
    let mut last_message = Instant::now();
    while received < 20 && last_message.elapsed() < Duration::from_secs(5) {
        let got = receiver.poll_one(|payload| match decode(payload) {
            Some((instrument, bid, ask, ts)) => {
                tracing::info!(instrument, bid, ask, ts, "received update");
            }
            None => tracing::warn!(len = payload.len(), "unexpected payload size"),
        })?;
        if got {
            received += 1;
            last_message = Instant::now();
        } else {
            std::thread::yield_now();
        }
    }

    tracing::info!(received, "receiver finished");
    Ok(())
}
