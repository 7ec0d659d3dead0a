use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Smart lock edge daemon.
#[derive(Parser, Debug)]
#[command(name = "smartlock-edge")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "SMARTLOCK_CONFIG", default_value = "smartlock.toml")]
    pub config: PathBuf,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the orchestrator and the remote control server
    Run {
        /// Use an in-process serial link instead of the configured port
        #[arg(long)]
        simulate_serial: bool,
    },

    /// Enroll a face image under a name
    Enroll {
        /// Identity name
        #[arg(long)]
        name: String,

        /// Image containing the face
        #[arg(long)]
        image: PathBuf,
    },

    /// Validate the configuration and print it with defaults filled in
    CheckConfig,
}
