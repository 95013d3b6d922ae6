//! Handles settings for the application. Configuration is written in
//! `settings.toml`.

use config::{Config, ConfigError, File};
use serde::Deserialize;

use crate::worker::WorkerSettings;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

/// Database backing the ledger. `memory` is only useful for local poking;
/// a deployment points at a file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    /// Shared secret the processor attaches to callback requests.
    pub callback_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub processor: engine::ProcessorConfig,
    pub server: Option<Server>,
    pub worker: Option<WorkerSettings>,
    #[serde(default)]
    pub reserve: engine::ReserveConfig,
    #[serde(default)]
    pub credit: engine::CreditPolicy,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings"))
            .build()?;

        settings.try_deserialize()
    }
}
