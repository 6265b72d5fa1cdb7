use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "probescope")]
#[command(author = "ProbeScope")]
#[command(version = "0.1.0")]
#[command(about = "Parse nmap-service-probes databases and fingerprint captured responses", long_about = None)]
pub struct Cli {
    #[arg(help = "Path to an nmap-service-probes style database")]
    pub file: PathBuf,

    #[arg(short = 'F', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormat,

    #[arg(short, long, help = "Write output to this file instead of stdout")]
    pub output: Option<PathBuf>,

    #[arg(short, long, help = "Match the raw bytes in this file against every probe")]
    pub response: Option<PathBuf>,

    #[arg(long, help = "Only keep probes with this name (repeatable)")]
    pub probe: Vec<String>,

    #[arg(long, help = "Match rules evaluated at once per response (default: 20)")]
    pub concurrency: Option<usize>,

    #[arg(long, help = "Largest response read per probe, in bytes (default: 4096)")]
    pub read_size: Option<usize>,

    #[arg(long, help = "Read timeout in ms when a probe has no totalwaitms (default: 3000)")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Disable colored output")]
    pub no_color: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum OutputFormat {
    #[value(name = "human", help = "Human-readable output")]
    Human,
    #[value(name = "json", help = "JSON output")]
    Json,
}
