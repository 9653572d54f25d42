//! # Configuration Management
//!
//! Configuration for the sending and receiving ends of the relay.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Environment variables via `from_env()`
//! - Direct construction with `SenderConfig::new` / `ReceiverConfig::new`
//!
//! ## Security Considerations
//! - The shared key is required and must be non-empty on both ends
//! - The legacy payload format is disabled unless explicitly allowed
//! - Every network wait is bounded by a timeout

use crate::error::{constants, RelayError, Result};
use crate::utils::crypto::{DigestAlgorithm, SharedKey};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Listen backlog used when none is configured
pub const DEFAULT_BACKLOG: u32 = 5;

/// Key written into generated example configs
pub const KEY_PLACEHOLDER: &str = "change-me";

/// Top-level configuration; either side may be absent
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RelayConfig {
    /// Outbound side, present on producing instances
    #[serde(default)]
    pub sender: Option<SenderConfig>,

    /// Inbound side, present on collecting instances
    #[serde(default)]
    pub receiver: Option<ReceiverConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| RelayError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| RelayError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| RelayError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    ///
    /// `MONITOR_RELAY_KEY` is shared by both sides. A sender is configured when
    /// `MONITOR_RELAY_SENDER_HOST` is set, a receiver when
    /// `MONITOR_RELAY_RECEIVER_PORT` is set. A variable that is set but does
    /// not parse is an error, never silently ignored.
    ///
    /// Sender: `_SENDER_PORT`, `_CONNECT_TIMEOUT_MS`, `_SEND_TIMEOUT_MS`.
    /// Receiver: `_BIND_ADDRESS`, `_BACKLOG`, `_READ_TIMEOUT_MS`,
    /// `_ALLOW_LEGACY_FORMAT`. Both: `_DIGEST`, `_LOG_LEVEL`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        let key = std::env::var("MONITOR_RELAY_KEY").ok();
        let digest = match std::env::var("MONITOR_RELAY_DIGEST") {
            Ok(name) => parse_digest(&name)?,
            Err(_) => DigestAlgorithm::default(),
        };

        if let Ok(host) = std::env::var("MONITOR_RELAY_SENDER_HOST") {
            let port = env_port("MONITOR_RELAY_SENDER_PORT")?;
            let key = required_key(key.as_deref())?;
            let mut sender = SenderConfig::new(host, port, key);
            sender.digest = digest;

            if let Some(ms) = env_parse::<u64>("MONITOR_RELAY_CONNECT_TIMEOUT_MS")? {
                sender.connect_timeout = Duration::from_millis(ms);
            }
            if let Some(ms) = env_parse::<u64>("MONITOR_RELAY_SEND_TIMEOUT_MS")? {
                sender.send_timeout = Duration::from_millis(ms);
            }
            config.sender = Some(sender);
        }

        if std::env::var("MONITOR_RELAY_RECEIVER_PORT").is_ok() {
            let port = env_port("MONITOR_RELAY_RECEIVER_PORT")?;
            let key = required_key(key.as_deref())?;
            let mut receiver = ReceiverConfig::new(port, key);
            receiver.digest = digest;

            if let Ok(flag) = std::env::var("MONITOR_RELAY_ALLOW_LEGACY_FORMAT") {
                receiver.allow_legacy_format = matches!(flag.as_str(), "1" | "true" | "yes");
            }
            if let Some(addr) = env_parse::<IpAddr>("MONITOR_RELAY_BIND_ADDRESS")? {
                receiver.bind_address = addr;
            }
            if let Some(backlog) = env_parse::<u32>("MONITOR_RELAY_BACKLOG")? {
                receiver.backlog = backlog;
            }
            if let Some(ms) = env_parse::<u64>("MONITOR_RELAY_READ_TIMEOUT_MS")? {
                receiver.read_timeout = Duration::from_millis(ms);
            }
            config.receiver = Some(receiver);
        }

        if let Ok(level) = std::env::var("MONITOR_RELAY_LOG_LEVEL") {
            config.logging.log_level = level
                .parse::<Level>()
                .map_err(|_| RelayError::ConfigError(format!("Invalid log level: {level}")))?;
        }

        Ok(config)
    }

    /// Generate example configuration file content
    ///
    /// Keys are never serialized, so a placeholder is written into each
    /// endpoint section by hand.
    pub fn example_config() -> String {
        let example = Self {
            sender: SharedKey::new(KEY_PLACEHOLDER)
                .ok()
                .map(|key| SenderConfig::new("collector.example.com", 1234, key)),
            receiver: SharedKey::new(KEY_PLACEHOLDER)
                .ok()
                .map(|key| ReceiverConfig::new(1234, key)),
            logging: LoggingConfig::default(),
        };

        let mut value = match toml::Value::try_from(&example) {
            Ok(value) => value,
            Err(_) => return String::from("# Failed to generate example config"),
        };
        for section in ["sender", "receiver"] {
            if let Some(table) = value.get_mut(section).and_then(toml::Value::as_table_mut) {
                table.insert("key".into(), toml::Value::String(KEY_PLACEHOLDER.into()));
            }
        }
        toml::to_string_pretty(&value)
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    ///
    /// Shared keys are left out. Put them back (or load the file with a key
    /// added from the environment) before the saved file is used again.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RelayError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| RelayError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Some(sender) = &self.sender {
            errors.extend(sender.validate());
        }

        if let Some(receiver) = &self.receiver {
            errors.extend(receiver.validate());
        }

        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        into_result(self.validate())
    }
}

fn into_result(errors: Vec<String>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(RelayError::ConfigError(format!(
            "Configuration validation failed:\n  - {}",
            errors.join("\n  - ")
        )))
    }
}

fn required_key(raw: Option<&str>) -> Result<SharedKey> {
    match raw {
        Some(raw) => SharedKey::new(raw),
        None => Err(RelayError::ConfigError(constants::ERR_EMPTY_KEY.into())),
    }
}

fn env_port(var: &str) -> Result<u16> {
    let raw = std::env::var(var)
        .map_err(|_| RelayError::ConfigError(format!("{var} is required")))?;
    raw.parse::<u16>()
        .map_err(|_| RelayError::ConfigError(format!("{var} is not a valid port: '{raw}'")))
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Result<Option<T>> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| RelayError::ConfigError(format!("{var} has an invalid value: '{raw}'"))),
        Err(_) => Ok(None),
    }
}

fn parse_digest(name: &str) -> Result<DigestAlgorithm> {
    match name.to_ascii_lowercase().as_str() {
        "sha256" => Ok(DigestAlgorithm::Sha256),
        "sha512" => Ok(DigestAlgorithm::Sha512),
        other => Err(RelayError::ConfigError(format!(
            "Unknown digest algorithm: '{other}' (expected sha256 or sha512)"
        ))),
    }
}

/// Sending side configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SenderConfig {
    /// Collector host name or address
    pub host: String,

    /// Collector port
    pub port: u16,

    /// Shared secret; read from configuration, never written back
    #[serde(skip_serializing)]
    pub key: SharedKey,

    /// Digest algorithm; must match the receiver
    #[serde(default)]
    pub digest: DigestAlgorithm,

    /// Timeout for connection attempts
    #[serde(with = "duration_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Timeout for writing and closing one frame
    #[serde(with = "duration_serde", default = "default_send_timeout")]
    pub send_timeout: Duration,
}

impl SenderConfig {
    pub fn new(host: impl Into<String>, port: u16, key: SharedKey) -> Self {
        Self {
            host: host.into(),
            port,
            key,
            digest: DigestAlgorithm::default(),
            connect_timeout: timeout::CONNECT_TIMEOUT,
            send_timeout: timeout::SEND_TIMEOUT,
        }
    }

    /// Validate sender configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.host.trim().is_empty() {
            errors.push(constants::ERR_EMPTY_HOST.to_string());
        }

        if self.port == 0 {
            errors.push(constants::ERR_ZERO_PORT.to_string());
        }

        if self.key.is_empty() {
            errors.push(constants::ERR_EMPTY_KEY.to_string());
        }

        if self.connect_timeout.as_millis() < 10 {
            errors.push("Connect timeout too short (minimum: 10ms)".to_string());
        } else if self.connect_timeout.as_secs() > 300 {
            errors.push("Connect timeout too long (maximum: 300s)".to_string());
        }

        if self.send_timeout.as_millis() < 10 {
            errors.push("Send timeout too short (minimum: 10ms)".to_string());
        } else if self.send_timeout.as_secs() > 300 {
            errors.push("Send timeout too long (maximum: 300s)".to_string());
        }

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        into_result(self.validate())
    }
}

/// Receiving side configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReceiverConfig {
    /// Address to bind; all interfaces by default
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Port to listen on; 0 picks an ephemeral port
    pub port: u16,

    /// Shared secret; read from configuration, never written back
    #[serde(skip_serializing)]
    pub key: SharedKey,

    /// Accept payloads in the legacy binary format
    #[serde(default)]
    pub allow_legacy_format: bool,

    /// Digest algorithm; must match the sender
    #[serde(default)]
    pub digest: DigestAlgorithm,

    /// Listen backlog
    #[serde(default = "default_backlog")]
    pub backlog: u32,

    /// Idle timeout between reads on one connection
    #[serde(with = "duration_serde", default = "default_read_timeout")]
    pub read_timeout: Duration,
}

impl ReceiverConfig {
    pub fn new(port: u16, key: SharedKey) -> Self {
        Self {
            bind_address: default_bind_address(),
            port,
            key,
            allow_legacy_format: false,
            digest: DigestAlgorithm::default(),
            backlog: DEFAULT_BACKLOG,
            read_timeout: timeout::READ_TIMEOUT,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Validate receiver configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.key.is_empty() {
            errors.push(constants::ERR_EMPTY_KEY.to_string());
        }

        if self.backlog == 0 {
            errors.push("Listen backlog must be greater than 0".to_string());
        } else if self.backlog > 65_535 {
            errors.push(format!("Listen backlog too large: {}", self.backlog));
        }

        if self.read_timeout.as_millis() < 100 {
            errors.push("Read timeout too short (minimum: 100ms)".to_string());
        } else if self.read_timeout.as_secs() > 3600 {
            errors.push("Read timeout too long (maximum: 1 hour)".to_string());
        }

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        into_result(self.validate())
    }
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_backlog() -> u32 {
    DEFAULT_BACKLOG
}

fn default_connect_timeout() -> Duration {
    timeout::CONNECT_TIMEOUT
}

fn default_send_timeout() -> Duration {
    timeout::SEND_TIMEOUT
}

fn default_read_timeout() -> Duration {
    timeout::READ_TIMEOUT
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Path to log file; logs go to stderr when unset
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("monitor-relay"),
            log_level: Level::INFO,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if let Some(ref path) = self.log_file_path {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    errors.push(format!(
                        "Log file directory does not exist: {}",
                        parent.display()
                    ));
                }
            }
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
