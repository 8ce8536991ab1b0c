//! Hlekkr CLI - operator tooling for the media verification pipeline
//!
//! # Usage
//!
//! ```bash
//! # Verify an exported custody chain
//! hlekkr verify --chain chain.json --key dev-signing-secret
//!
//! # Classify detected manipulation indicators
//! hlekkr classify facial_asymmetry=0.8 identity_inconsistency=0.9
//!
//! # Show the built-in technique signature set
//! hlekkr signatures
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{classify, signatures, verify};

/// Hlekkr - tamper-evident media verification
///
/// Every processing step is hash-linked and HMAC-signed into a per-media
/// custody chain; this CLI verifies exported chains and runs the pure
/// analysis tools offline.
#[derive(Parser)]
#[command(
    name = "hlekkr",
    version,
    about = "Hlekkr CLI - media verification tooling"
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify an exported custody chain
    Verify(verify::VerifyArgs),

    /// Classify manipulation indicators offline
    Classify(classify::ClassifyArgs),

    /// List the built-in technique signatures
    Signatures,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Verify(args) => verify::run(args).await,
        Commands::Classify(args) => classify::run(args),
        Commands::Signatures => signatures::run(),
    }
}

fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();
}
