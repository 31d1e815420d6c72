//! Serial ingest: reassemble frames from the camera link, run detection, and
//! mirror the annotated result to a local preview server.

mod config;
mod pipeline;
mod preview;

pub use config::SerialConfig;

use anyhow::Result;

pub fn run_from_args(args: &[String]) -> Result<()> {
    let config = SerialConfig::from_args(args)?;
    pipeline::run(config)
}
