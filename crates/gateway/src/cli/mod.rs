pub mod config;

use clap::{Parser, Subcommand};

use cr_domain::config::Config;

/// cartrunner: scripted add-to-cart runner with a live log stream.
#[derive(Debug, Parser)]
#[command(name = "cartrunner", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (defaults and env overrides applied)
    /// as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `CR_CONFIG` (or
/// `config.toml` by default), then apply environment overrides.  Returns
/// the resolved [`Config`] and the path that was used.
///
/// A missing file is not an error: every section has defaults.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("CR_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let mut config = load_config_from(&config_path)?;
    config.apply_env_overrides();
    Ok((config, config_path))
}

/// Parse `path` if it exists, defaults otherwise. No env overrides.
pub fn load_config_from(path: &str) -> anyhow::Result<Config> {
    if !std::path::Path::new(path).exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("reading {path}: {e}"))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {path}: {e}"))
}
