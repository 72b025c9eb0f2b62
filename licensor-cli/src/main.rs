//! Licensor command line.
//!
//! Usage:
//!   licensor issue --keys account.toml --resource license.json --algorithm ed25519
//!   licensor verify --config licensor.toml
//!   licensor fingerprint
//!
//! Log filtering follows `RUST_LOG` (default `info`); `-v` forces `debug`.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use licensor_cli::{fingerprint, issue, verify, Cli, Command};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    // -v wins over RUST_LOG
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match cli.command {
        Command::Issue(args) => {
            let certificate = issue(&args)?;
            info!(
                account = certificate.account_id(),
                resource = certificate.resource_id(),
                expiry = ?certificate.expires_at(),
                "issued certificate"
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify(args) => {
            let status = verify(&args)?;
            println!("{status}");
            if status.is_valid() {
                Ok(ExitCode::SUCCESS)
            } else {
                warn!(%status, "license file is not valid");
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Fingerprint => {
            println!("{}", fingerprint());
            Ok(ExitCode::SUCCESS)
        }
    }
}
