//! Price-feed producer.
//!
//! Creates the `price_feed` channel and publishes a burst of updates at
//! 10 Hz. Run the `receiver` example in another terminal to consume them.
//!
//! Run with: `cargo run --example sender -p swiftchannel`

use std::time::Duration;

use swiftchannel::prelude::*;

/// One quote, encoded little-endian to 24 bytes.
struct PriceUpdate {
    instrument_id: u32,
    bid: f64,
    ask: f64,
    timestamp_ns: u64,
}

impl PriceUpdate {
    fn encode(&self) -> [u8; 28] {
        let mut out = [0u8; 28];
        out[0..4].copy_from_slice(&self.instrument_id.to_le_bytes());
        out[4..12].copy_from_slice(&self.bid.to_le_bytes());
        out[12..20].copy_from_slice(&self.ask.to_le_bytes());
        out[20..28].copy_from_slice(&self.timestamp_ns.to_le_bytes());
        out
    }
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

    let stats = std::sync::Arc::new(ChannelStats::new());
    let sender = Sender::with_observer("price_feed", config, stats.clone())?;
    tracing::info!(name = sender.name(), "sender ready");

    for i in 0..20u32 {
        let update = PriceUpdate {
            instrument_id: 1000 + (i % 5),
            bid: 100.0 + f64::from(i) * 0.5,
            ask: 100.1 + f64::from(i) * 0.5,
            timestamp_ns: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0),
        };

        match sender.send(&update.encode()) {
            Ok(()) => tracing::info!(
                instrument = update.instrument_id,
                bid = update.bid,
                ask = update.ask,
                "sent update #{i}"
            ),
            Err(Error::ChannelFull) => {
                tracing::warn!("ring full, dropping update #{i}")
            }
            Err(err) => return Err(err),
        }

        std::thread::sleep(Duration::from_millis(100));
    }

    let snap = stats.snapshot();
    tracing::info!(
        sent = snap.messages_sent,
        bytes = snap.bytes_sent,
        dropped = snap.buffer_full_events,
        "sender finished"
    );
    Ok(())
}
