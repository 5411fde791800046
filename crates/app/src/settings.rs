//! Settings of the application, read from `settings.toml`.
//!
//! Every key can be overridden from the environment with the `THARWA__`
//! prefix, e.g. `THARWA__SERVER__PORT=8080`.

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use split_engine::LedgerPolicy;

#[derive(Debug, Parser)]
#[command(name = "tharwa_split", about = "Shared-expense ledger server")]
struct Args {
    /// Settings file (TOML), without or with extension.
    #[arg(long, env = "THARWA_SETTINGS", default_value = "settings")]
    settings: String,
}

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    /// Origin of the invite links handed out to members.
    pub public_origin: String,
    pub database: Database,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub server: Server,
    #[serde(default)]
    pub ledger: LedgerPolicy,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let args = Args::parse();

        let settings = Config::builder()
            .add_source(File::with_name(&args.settings))
            .add_source(
                Environment::with_prefix("THARWA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}
