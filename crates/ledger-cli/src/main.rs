//! Reference binary for the praxis session client.
//!
//! Usage:
//!   px-ledger address --mnemonic "correct horse battery staple"
//!   px-ledger sign --challenge challengeme-1700000000000
//!   px-ledger demo --anonymous
//!   px-ledger config validate --config px.toml
//!
//! Env vars:
//!   PX_MNEMONIC  — secret mnemonic used when `--mnemonic` is omitted
//!   PX_CONFIG    — config file path (default: px.toml)
//!   RUST_LOG     — log filter (default: info)

mod cli;
mod demo;

use clap::Parser;
use px_identity::{Challenge, Ledger};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (config, config_path) = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Address { mnemonic, network } => {
            let mnemonic = cli::resolve_mnemonic(mnemonic)?;
            let version = network.map_or_else(|| config.network_version(), |n| n.version());
            let ledger = Ledger::from_mnemonic(mnemonic, version)?;
            println!("{}", ledger.address());
            Ok(())
        }
        Command::Sign { mnemonic, challenge } => {
            let mnemonic = cli::resolve_mnemonic(mnemonic)?;
            let ledger = Ledger::from_mnemonic(mnemonic, config.network_version())?;
            let challenge = challenge.map_or_else(Challenge::now, |c| Challenge::from(c.as_str()));
            let signed = ledger.sign_challenge(&challenge)?;
            println!("address:    {}", ledger.address());
            println!("challenge:  {challenge}");
            println!("signature:  {}", signed.signature);
            println!("public key: {}", signed.public_key);
            Ok(())
        }
        Command::Demo { mnemonic, anonymous } => {
            if !cli::validate(&config, &config_path) {
                std::process::exit(1);
            }
            let ledger = if anonymous {
                Ledger::anonymous()
            } else {
                Ledger::from_mnemonic(cli::resolve_mnemonic(mnemonic)?, config.network_version())?
            };
            tracing::info!(address = %ledger.address(), network = %config.connection.network, "starting demo");
            demo::run(config, ledger).await
        }
        Command::Config(ConfigCommand::Validate) => {
            if !cli::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => cli::show(&config),
    }
}
