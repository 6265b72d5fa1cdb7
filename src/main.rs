mod cli;
mod output;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use probescope::{parse_file, DetectorConfig, ServiceDetector};

use crate::cli::Cli;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let mut probes = parse_file(&cli.file)
        .with_context(|| format!("failed to read probe database {}", cli.file.display()))?;
    if !cli.probe.is_empty() {
        probes.retain(|probe| cli.probe.contains(&probe.name));
    }
    debug!("{} probes selected", probes.len());

    let output_writer = OutputWriter::new(cli.format, cli.output.clone())?;

    let response_path = match &cli.response {
        Some(path) => path,
        None => return output_writer.write_probes(&probes),
    };

    let mut config = DetectorConfig::default();
    if let Some(limit) = cli.concurrency {
        config = config.with_max_concurrent_matches(limit);
    }
    if let Some(bytes) = cli.read_size {
        config = config.with_read_size(bytes);
    }
    if let Some(ms) = cli.timeout {
        config = config.with_read_timeout(Duration::from_millis(ms));
    }
    debug!("Detector config: {:?}", config);

    let response = tokio::fs::read(response_path)
        .await
        .with_context(|| format!("failed to read response {}", response_path.display()))?;

    let detector = ServiceDetector::new(config);
    let identity = detector.identify_captured(&probes, &response).await;

    output_writer.write_identity(response_path, identity.as_ref())
}
