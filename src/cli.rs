use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hlsproxy")]
#[command(author, version, about = "Loopback caching reverse proxy for HLS streams")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the proxy and serve until Ctrl+C
    Start {
        /// Loopback address to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the proxy URL for an origin URL
    Url {
        /// Origin URL of a manifest or segment
        #[arg(required = true)]
        origin: String,

        /// Proxy port to encode (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Delete every cached resource
    ClearCache,

    /// Show cache occupancy
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
