use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use common::config::{ConversionConfig, SchedulerConfig, StorageConfig};

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Default: "sqlite://data/resource.db?mode=rwc".
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Default: 10.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "sqlite://data/resource.db?mode=rwc".into()
}
fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// One-off work performed before the scheduler starts.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct StartupConfig {
    /// Re-save every stored file once, recomputing checksums and statuses.
    #[serde(default)]
    pub resave_all: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub conversion: ConversionConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub startup: StartupConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("RESOURCE_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            // Load from config/config.toml
            .add_source(File::with_name(&config_path).required(false))
            // Override from environment (e.g., RESOURCE__CONVERSION__BINARY_PATH)
            .add_source(
                Environment::with_prefix("RESOURCE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("scheduler.skip_mime_patterns")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }
}
