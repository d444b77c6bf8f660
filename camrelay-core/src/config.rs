use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub socket: SocketConfig,
    pub stream: StreamConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP surface binds to.
    pub http_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Rendezvous socket path; empty means `$HOME/camsock.sock`.
    pub path: String,
    /// Consecutive accept failures tolerated before the listener gives up.
    pub max_accept_failures: u32,
    /// Base accept retry backoff in milliseconds.
    pub accept_backoff_ms: u64,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            max_accept_failures: 8,
            accept_backoff_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Frames buffered between the producer task and readers.
    pub frame_queue_depth: usize,
    /// Bytes read from the rendezvous connection per frame.
    pub read_chunk_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            frame_queue_depth: 32,
            read_chunk_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Environment variable holding the bcrypt password hash.
    pub bcrypt_hash_env: String,
    /// Environment variable holding the argon2 PHC password hash.
    pub argon2_hash_env: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_hash_env: "PASS_HASH_BC".to_string(),
            argon2_hash_env: "PASS_HASH_AR".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" for production, "pretty" for development.
    pub format: String,
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from an optional file plus `CAMRELAY_*` environment
    /// overrides (e.g. `CAMRELAY_SERVER__HTTP_ADDR`), falling back to
    /// defaults for anything unset.
    pub fn load(file: Option<&str>) -> Result<Self, ConfigError> {
        ConfigBuilder::builder()
            .add_source(File::with_name(file.unwrap_or("config")).required(false))
            .add_source(Environment::with_prefix("CAMRELAY").separator("__"))
            .build()?
            .try_deserialize()
    }
}
