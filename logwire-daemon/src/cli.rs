//! CLI argument definitions for logwire-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// logwire syslog ingestion and dispatch daemon.
///
/// Receives syslog over TCP/UDP, frames and parses it, and publishes
/// rule matches to an AMQP broker.
#[derive(Parser, Debug)]
#[command(name = "logwire-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logwire.toml configuration file.
    #[arg(short, long, default_value = "/etc/logwire/logwire.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration (including the dispatcher file) and exit.
    #[arg(long)]
    pub validate: bool,
}
