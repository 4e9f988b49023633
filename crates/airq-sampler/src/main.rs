//! airq-sampler - push serial sensor readings to airq-service.
//!
//! Run with: `cargo run -p airq-sampler -- --device-id office`

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};

use airq_sampler::{Sampler, SamplerConfig};

/// airq-sampler - read a PM2.5/PM10 sensor and push readings to the API.
#[derive(Parser, Debug)]
#[command(name = "airq-sampler")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device ID to report (overrides config).
    #[arg(long)]
    device_id: Option<String>,

    /// Serial port (overrides config).
    #[arg(short, long)]
    port: Option<String>,

    /// Reading endpoint URL (overrides config).
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Seconds between samples (overrides config).
    #[arg(short, long)]
    interval: Option<u64>,

    /// Take one sample, push it and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("airq_sampler=info".parse()?),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => SamplerConfig::load(path)?,
        None => SamplerConfig::load_default().unwrap_or_default(),
    };

    if let Some(device_id) = args.device_id {
        config.device_id = device_id;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(interval) = args.interval {
        config.interval_secs = interval;
    }
    config.validate()?;

    if config.uses_reserved_device_id() {
        warn!(
            "Device ID is still '{}'; the server will reject every reading. \
             Set device_id in the config or pass --device-id.",
            config.device_id
        );
    }

    let sampler = Sampler::new(config)?;

    if args.once {
        let payload = sampler.sample_once().await?;
        info!(
            "Sent {} PM2.5={} PM10={}",
            payload.timestamp, payload.pm25, payload.pm10
        );
        return Ok(());
    }

    info!("Starting air quality sampling...");
    sampler.run().await;
    Ok(())
}
