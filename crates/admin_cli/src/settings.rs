//! Settings for the admin tool, read from an optional `settings.toml` and
//! `STOCK__*` environment variables (e.g. `STOCK__APP__LEVEL=debug`).
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:./stock.db?mode=rwc";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub database: Option<Database>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("STOCK").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Connection string for the configured database, `./stock.db` if none.
    pub fn database_url(&self) -> String {
        match &self.database {
            Some(Database::Memory) => String::from("sqlite::memory:"),
            Some(Database::Sqlite(path)) => format!("sqlite:{path}?mode=rwc"),
            None => String::from(DEFAULT_DATABASE_URL),
        }
    }
}
