use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelpass")]
#[command(author, version, about = "Pay-per-asset media streaming server")]
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
    /// Start the HTTP server
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Create a user account
    AddUser {
        username: String,

        /// Grant the administrative override (streams everything)
        #[arg(long)]
        admin: bool,
    },

    /// Issue a bearer token for an existing user
    IssueToken {
        username: String,

        /// Token lifetime in hours (defaults to auth.token_ttl_hours)
        #[arg(long)]
        hours: Option<u64>,
    },

    /// Register a media asset whose bytes live under storage.media_dir
    AddAsset {
        #[arg(long)]
        title: String,

        /// Price in major currency units
        #[arg(long)]
        price: i64,

        /// Path of the blob relative to storage.media_dir
        #[arg(long)]
        storage_key: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Change an asset's price (existing orders keep their amount)
    SetPrice {
        asset_id: String,
        price: i64,
    },

    /// Record a payment made outside the gateway flow
    Grant {
        username: String,
        asset_id: String,

        /// Payment reference to record (must be unique)
        #[arg(long)]
        payment_ref: String,
    },

    /// Generate a random secret suitable for payment.key_secret in tests
    GenerateSecret,

    /// Display version information
    Version,
}
