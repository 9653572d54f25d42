//! Example: a sender and a receiver talking over loopback
//!
//! Starts a receiver on an ephemeral port, flushes a few batches at it,
//! prints what arrives, then stops the receiver cooperatively.
//!
//! Run with: `cargo run --example relay_pair`
//!
//! Set `MONITOR_RELAY_KEY` to use your own shared key and `RUST_LOG=debug`
//! to watch the relay's own logging.

#![allow(clippy::uninlined_format_args)]

use monitor_relay::utils::logging::init_logging;
use monitor_relay::{
    ChannelAggregator, FlushOutcome, LoggingConfig, MonitorRecord, Receiver, ReceiverConfig,
    Sender, SenderConfig, SharedKey,
};
use serde_json::json;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&LoggingConfig::default())?;
    println!("=== Monitor Relay Demo ===\n");

    let raw_key = std::env::var("MONITOR_RELAY_KEY").unwrap_or_else(|_| "demo-key".into());
    let key = SharedKey::new(raw_key)?;

    let mut receiver_config = ReceiverConfig::new(0, key.clone());
    receiver_config.bind_address = "127.0.0.1".parse()?;
    let (aggregator, mut results) = ChannelAggregator::new();
    let handle = Receiver::bind(receiver_config, aggregator).await?.start();
    println!("Receiver listening on {}", handle.local_addr());

    let mut sender = Sender::new(SenderConfig::new(
        "127.0.0.1",
        handle.local_addr().port(),
        key,
    ))?;
    println!("{}\n", sender.describe());

    for cycle in 0..3u32 {
        sender.start_batch();
        sender.record(
            "web",
            MonitorRecord::new(
                "MonitorHTTP",
                json!({"url": "http://example.com", "ok": cycle != 1}),
            ),
        );
        sender.record(
            "load",
            MonitorRecord::new("MonitorLoadAvg", json!({"load": 0.25 * f64::from(cycle)})),
        );

        match sender.flush().await {
            FlushOutcome::Sent { records, bytes } => {
                println!("cycle {}: sent {} records in {} bytes", cycle, records, bytes)
            }
            FlushOutcome::Dropped { records } => {
                println!("cycle {}: dropped {} records", cycle, records)
            }
        }

        if let Ok(Some(result)) = tokio::time::timeout(Duration::from_secs(2), results.recv()).await
        {
            println!(
                "  received {} monitors from {} ({})",
                result.batch.len(),
                result.source,
                result.format.name()
            );
            for (name, record) in &result.batch {
                println!("    {} [{}] {}", name, record.type_name, record.state);
            }
        }
    }

    handle.request_stop();
    let metrics = handle.metrics();
    handle.join().await?;

    println!("\nReceiver stopped: {:?}", metrics.snapshot());
    Ok(())
}
