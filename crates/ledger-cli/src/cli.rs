use clap::{Parser, Subcommand};
use px_domain::config::{Config, ConfigSeverity, Network};

/// px-ledger — ledger identity and session tooling.
#[derive(Debug, Parser)]
#[command(name = "px-ledger", version, about)]
pub struct Cli {
    /// Path to the config file (defaults to `PX_CONFIG`, then `px.toml`).
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the address derived from a mnemonic.
    Address {
        /// Secret mnemonic (falls back to `PX_MNEMONIC`).
        #[arg(long)]
        mnemonic: Option<String>,
        /// Network whose version byte is used (defaults to the config's).
        #[arg(long)]
        network: Option<Network>,
    },
    /// Sign a handshake challenge and print the signature.
    Sign {
        /// Secret mnemonic (falls back to `PX_MNEMONIC`).
        #[arg(long)]
        mnemonic: Option<String>,
        /// Challenge text (defaults to a fresh `challengeme-<millis>`).
        #[arg(long)]
        challenge: Option<String>,
    },
    /// Open a loopback session against an in-process router and exercise it.
    Demo {
        /// Secret mnemonic (falls back to `PX_MNEMONIC`).
        #[arg(long, conflicts_with = "anonymous")]
        mnemonic: Option<String>,
        /// Connect as the keyless anonymous ledger.
        #[arg(long)]
        anonymous: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any issues.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Helpers ───────────────────────────────────────────────────────────

/// Load the configuration from `path`, `PX_CONFIG`, or `px.toml`, in that
/// order.  A missing file yields the defaults.  Returns the config and the
/// path that was consulted.
pub fn load_config(path: Option<&str>) -> anyhow::Result<(Config, String)> {
    let config_path = path
        .map(str::to_owned)
        .or_else(|| std::env::var("PX_CONFIG").ok())
        .unwrap_or_else(|| "px.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path).map_err(|e| anyhow::anyhow!("loading {config_path}: {e}"))?
    } else {
        tracing::debug!(path = %config_path, "config file not found, using defaults");
        Config::default()
    };

    Ok((config, config_path))
}

/// The mnemonic from the command line, else from `PX_MNEMONIC`.
pub fn resolve_mnemonic(arg: Option<String>) -> anyhow::Result<String> {
    arg.or_else(|| std::env::var("PX_MNEMONIC").ok())
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("no mnemonic given (use --mnemonic or PX_MNEMONIC)"))
}

/// Print every config issue.  Returns `false` if any is an error.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    println!(
        "\n{} error(s), {} warning(s) in {config_path}",
        error_count, warning_count,
    );

    error_count == 0
}

pub fn show(config: &Config) -> anyhow::Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
