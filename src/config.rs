use crate::catalog::PatternConfig;
use crate::extraction::ExtractionConfig;
use crate::search::{IndexConfig, SearchConfig};
use crate::sources::{FieldTypeRules, MetadataApiConfig};
use crate::sync::SyncConfig;
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub pattern: PatternConfig,

    #[serde(default)]
    pub field_types: FieldTypeRules,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub metadata_api: MetadataApiConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and
    /// the environment, in increasing precedence.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("MDS_CONFIG_PATH").unwrap_or_else(|_| "config/local.toml".to_string());

        config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::with_name(&config_path).required(false))
            // e.g. MDS__SEARCH__WEIGHTS__FULLTEXT=1.2
            .add_source(
                config::Environment::with_prefix("MDS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Cross-section checks that serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        self.search.validate()?;
        self.sync.schedule.validate().map_err(|e| e.to_string())?;
        if self.extraction.pool_size == 0 {
            return Err("extraction.pool_size must be at least 1".to_string());
        }
        if self.index.prefix.trim().is_empty() {
            return Err("index.prefix must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub json_logs: bool,

    /// Serve `GET /metrics`
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: true,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    60
}

fn default_log_level() -> String {
    "metadata_discovery=info,tower_http=info".to_string()
}

fn default_true() -> bool {
    true
}
