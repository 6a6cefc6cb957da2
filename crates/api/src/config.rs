use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::net::SocketAddr;

/// Minimum length accepted for the token signing secret.
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    /// Redemption token signing and validity-window configuration
    pub token: TokenConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Clone, Deserialize)]
pub struct TokenConfig {
    /// Process-wide HS256 signing secret. Injected per environment; never
    /// logged (only its fingerprint is).
    pub secret: String,

    /// The venue's reference timezone as minutes east of UTC. The event's
    /// validity window is its entire calendar day in this timezone.
    #[serde(default)]
    pub reference_utc_offset_minutes: i32,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"[REDACTED]")
            .field(
                "reference_utc_offset_minutes",
                &self.reference_utc_offset_minutes,
            )
            .finish()
    }
}

impl TokenConfig {
    /// The reference timezone as a chrono offset.
    pub fn reference_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.reference_utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of queued scans accepted in one reconciliation batch.
    #[serde(default = "default_max_sync_batch_size")]
    pub max_sync_batch_size: usize,
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with GL__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("GL").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(config::ConfigError::Message)?;
        Ok(cfg)
    }

    /// Startup validation of values no request should ever see wrong.
    fn validate(&self) -> Result<(), String> {
        if self.token.secret.len() < MIN_SECRET_LEN {
            return Err(format!(
                "token.secret must be at least {} bytes",
                MIN_SECRET_LEN
            ));
        }
        let offset = self.token.reference_utc_offset_minutes;
        if !(-14 * 60..=14 * 60).contains(&offset) {
            return Err(format!(
                "token.reference_utc_offset_minutes out of range: {}",
                offset
            ));
        }
        if self.limits.max_sync_batch_size == 0 || self.limits.max_sync_batch_size > 1000 {
            return Err(format!(
                "limits.max_sync_batch_size must be 1-1000, got {}",
                self.limits.max_sync_batch_size
            ));
        }
        Ok(())
    }

    /// The socket address the server binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], self.server.port)))
    }

    /// The persistence layer's view of the database settings.
    pub fn database_config(&self) -> persistence::db::DatabaseConfig {
        persistence::db::DatabaseConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            min_connections: self.database.min_connections,
            connect_timeout_secs: self.database.connect_timeout_secs,
            idle_timeout_secs: self.database.idle_timeout_secs,
        }
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Builds the config entirely from embedded defaults and overrides,
    /// without relying on config files (which may not be accessible during
    /// tests).
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "127.0.0.1"
            port = 0
            request_timeout_secs = 30

            [database]
            url = ""
            max_connections = 5
            min_connections = 1
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [security]
            cors_origins = []

            [token]
            secret = "test_secret_at_least_32_bytes_long!!"
            reference_utc_offset_minutes = 0

            [limits]
            max_sync_batch_size = 500
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()
            .map_err(config::ConfigError::Message)?;
        Ok(cfg)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_max_sync_batch_size() -> usize {
    500
}
