//! Configuration for Collabdesk

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of environment variables overriding file settings
pub const ENV_PREFIX: &str = "COLLABDESK";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Outbound mail configuration
    #[serde(default)]
    pub mail: MailConfig,

    /// Campaign dispatch configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: Option<String>,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Run migrations on startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            run_migrations: default_run_migrations(),
        }
    }
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_run_migrations() -> bool {
    true
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API port
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Serve the OpenAPI document and docs page
    #[serde(default = "default_enable_docs")]
    pub enable_docs: bool,

    /// CORS allowed origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
            enable_docs: default_enable_docs(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_api_port() -> u16 {
    8080
}

fn default_enable_docs() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Which collaborator delivers campaign emails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MailProvider {
    /// Gmail REST API, credential is an OAuth access token
    #[default]
    Gmail,
    /// SMTP relay authenticated with XOAUTH2
    Smtp,
}

/// Outbound mail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub provider: MailProvider,

    /// Sender address placed in the From header
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Optional display name for the From header
    pub from_name: Option<String>,

    /// Base URL of the Gmail API
    #[serde(default = "default_gmail_api_url")]
    pub gmail_api_url: String,

    /// SMTP relay host (smtp provider only)
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    /// SMTP relay port (smtp provider only)
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Timeout of a single send call in seconds
    #[serde(default = "default_mail_timeout")]
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            provider: MailProvider::default(),
            from_address: default_from_address(),
            from_name: None,
            gmail_api_url: default_gmail_api_url(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            timeout_secs: default_mail_timeout(),
        }
    }
}

fn default_from_address() -> String {
    "outreach@localhost".to_string()
}

fn default_gmail_api_url() -> String {
    "https://gmail.googleapis.com".to_string()
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_mail_timeout() -> u64 {
    30
}

/// Campaign dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Fixed delay between two consecutive sends, in milliseconds
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,

    /// A sending campaign with no activity for this long is considered stuck
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,

    /// How often the stuck-campaign sweeper runs
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            send_delay_ms: default_send_delay_ms(),
            stale_after_secs: default_stale_after(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_send_delay_ms() -> u64 {
    1000
}

fn default_stale_after() -> u64 {
    900
}

fn default_sweep_interval() -> u64 {
    60
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional file layered under environment variables
    pub fn load_from(path: Option<&Path>) -> crate::Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path.to_path_buf()).format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("api.cors_origins")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .and_then(|settings| settings.try_deserialize::<Config>())
            .map_err(|e| crate::Error::Config(format!("Failed to load config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings under which a live dispatch could be swept as stuck.
    ///
    /// The longest quiet gap of a healthy run is one pacing delay plus one
    /// send attempt, so `stale_after_secs` must exceed that.
    pub fn validate(&self) -> crate::Result<()> {
        let longest_step_ms = self
            .mail
            .timeout_secs
            .saturating_mul(1000)
            .saturating_add(self.dispatch.send_delay_ms);
        let stale_after_ms = self.dispatch.stale_after_secs.saturating_mul(1000);

        if stale_after_ms <= longest_step_ms {
            return Err(crate::Error::Config(format!(
                "dispatch.stale_after_secs ({}s) must be larger than mail.timeout_secs plus dispatch.send_delay_ms ({}ms)",
                self.dispatch.stale_after_secs, longest_step_ms
            )));
        }

        Ok(())
    }

    /// Load configuration from the first default location found, plus environment
    pub fn load() -> crate::Result<Self> {
        let paths = [
            PathBuf::from("./collabdesk.toml"),
            PathBuf::from("./config.toml"),
            PathBuf::from("/etc/collabdesk/config.toml"),
        ];

        let found = paths.iter().find(|path| path.exists());
        if let Some(path) = found {
            tracing::info!(path = %path.display(), "Loading configuration file");
        } else {
            tracing::info!("No configuration file found, using defaults and environment");
        }

        Self::load_from(found.map(PathBuf::as_path))
    }
}
