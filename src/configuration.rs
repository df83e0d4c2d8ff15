use std::time::Duration;

use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};

use crate::services::DEFAULT_MAX_PARTS;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub completion: CompletionSettings,
    pub search: SearchSettings,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub filename: String,
    pub create_if_missing: bool,
}

impl DatabaseSettings {
    pub fn connect_options(&self) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(&self.filename)
            .create_if_missing(self.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
    }
}

#[derive(Deserialize, Clone)]
pub struct CompletionSettings {
    pub base_url: String,
    pub model: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub temperature: f32,
    /// Bearer credential. Usually supplied through `APP_COMPLETION__API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_seconds: u64,
    #[serde(
        default = "default_max_parts",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub max_parts: u32,
    pub source_label: String,
}

fn default_max_parts() -> u32 {
    DEFAULT_MAX_PARTS
}

impl CompletionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Deserialize, Clone)]
pub struct SearchSettings {
    pub prompt_template: String,
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path =
        std::env::current_dir().map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}
