use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub write_back: WriteBackConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("gatekeeper.db")
}

/// Ticket cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// How long a scan waits for a ticket's lock before answering BUSY.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,
    /// zstd level for cached records (1-22).
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout(),
            compression_level: default_compression_level(),
        }
    }
}

fn default_lock_timeout() -> u64 {
    250
}

fn default_compression_level() -> i32 {
    crate::codec::DEFAULT_COMPRESSION_LEVEL
}

/// Entry-log write-back configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WriteBackConfig {
    /// Capacity of the queue between scans and the writer.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Attempts per fact before it is dropped with an alert.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    /// Upper bound on the delay between retries in milliseconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for WriteBackConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl WriteBackConfig {
    /// Delay before retry number `attempt` (1-indexed), capped at `max_backoff_ms`.
    pub fn backoff_for(&self, attempt: u32) -> std::time::Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = delay.min(self.max_backoff_ms as f64).max(0.0);
        std::time::Duration::from_millis(capped as u64)
    }
}

fn default_buffer_size() -> usize {
    10_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    5_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

/// Sanitized config for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: SanitizedDatabaseConfig,
    pub cache: CacheConfig,
    pub write_back: WriteBackConfig,
}

/// Database config without the full filesystem path.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDatabaseConfig {
    pub file_name: Option<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: SanitizedDatabaseConfig {
                file_name: config
                    .database
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned()),
            },
            cache: config.cache.clone(),
            write_back: config.write_back.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "gatekeeper.db");
        assert_eq!(config.cache.lock_timeout_ms, 250);
        assert_eq!(config.cache.compression_level, 3);
        assert_eq!(config.write_back.buffer_size, 10_000);
        assert_eq!(config.write_back.max_attempts, 5);
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[database]
path = "/data/festival.db"

[cache]
lock_timeout_ms = 50
compression_level = 9

[write_back]
buffer_size = 64
max_attempts = 2
initial_backoff_ms = 10
max_backoff_ms = 40
backoff_multiplier = 3.0
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.path.to_str().unwrap(), "/data/festival.db");
        assert_eq!(config.cache.lock_timeout_ms, 50);
        assert_eq!(config.cache.compression_level, 9);
        assert_eq!(config.write_back.buffer_size, 64);
        assert_eq!(config.write_back.max_attempts, 2);
        assert_eq!(config.write_back.backoff_multiplier, 3.0);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = WriteBackConfig {
            initial_backoff_ms: 100,
            max_backoff_ms: 500,
            backoff_multiplier: 2.0,
            ..Default::default()
        };
        assert_eq!(config.backoff_for(1), Duration::from_millis(100));
        assert_eq!(config.backoff_for(2), Duration::from_millis(200));
        assert_eq!(config.backoff_for(3), Duration::from_millis(400));
        assert_eq!(config.backoff_for(4), Duration::from_millis(500));
        assert_eq!(config.backoff_for(10), Duration::from_millis(500));
    }

    #[test]
    fn test_sanitized_config_hides_directory() {
        let config = Config {
            database: DatabaseConfig {
                path: PathBuf::from("/srv/secret/location/festival.db"),
            },
            ..Default::default()
        };
        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.database.file_name.as_deref(), Some("festival.db"));
        assert_eq!(sanitized.server.port, 8080);
    }
}
