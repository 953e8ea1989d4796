//! Command-line interface definitions.

use std::path::PathBuf;

use clap::Parser;

/// Warden - policy enforcement control plane for managed clusters.
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Minimum log level: DEBUG, INFO, WARNING, ERROR. Defaults to INFO;
    /// unrecognized values also mean INFO.
    #[arg(long)]
    pub log_level: Option<String>,
}
