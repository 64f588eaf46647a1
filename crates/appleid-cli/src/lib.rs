//! # `appleid` CLI
//!
//! Command-line front end for `appleid-auth`, for diagnostics and scripting.
//!
//! ## Usage
//!
//! ```bash
//! # Print Apple's current signing keys without touching the cache
//! appleid keys --no-cache
//!
//! # Verify an identity token for a web client
//! appleid verify "$ID_TOKEN" --audience com.example.web
//!
//! # Mint a client secret and exchange a code with it
//! export APPLEID_CLIENT_SECRET=$(appleid client-secret --client-id com.example.web \
//!     --team-id TEAM123456 --key-id KEY1234567 --private-key-path AuthKey_KEY1234567.p8)
//! appleid exchange "$CODE" --client-id com.example.web --redirect-uri https://example.com/cb
//! ```

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
pub mod settings;

use appleid_auth::AppleIdClient;
use clap::Parser;
use tracing_subscriber::EnvFilter;

pub use cli::{Cli, Commands, GlobalArgs, OutputFormat};
pub use error::{CliError, CliResult};

/// Parse arguments and run the selected command
///
/// # Errors
///
/// Returns the first error from configuration or the command.
pub async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let config = settings::load(&cli.global)?;
    let client = AppleIdClient::builder().with_config(config).build()?;

    commands::execute(cli.command, &client, output::Formatter::new(cli.global.format)).await
}

/// Install the stderr log subscriber (`RUST_LOG` wins over `-v`)
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
