//! HTTP ingest service: cameras POST raw frames, consumers read the latest
//! annotated frame and detection summary back out.

mod config;
mod server;

pub use config::GatewayConfig;

use anyhow::Result;

pub fn run_from_args(args: &[String]) -> Result<()> {
    let config = GatewayConfig::from_args(args)?;
    server::run(config)
}
