//! TOML-based configuration for the radar server.
//!
//! The file is given on the command line (default `radar-server.toml` in the
//! working directory).  A missing file is not an error: the server starts
//! with the defaults below, except that the TLS paths must then be supplied
//! through the command line or the environment.
//!
//! ```toml
//! [server]
//! log_level = "info"
//! display_interval_ms = 1000
//!
//! [network]
//! bind_address = "0.0.0.0"
//! port = 6898
//! handshake_timeout_ms = 10000
//!
//! [radar]
//! retention_ms = 5000
//! sweep_interval_ms = 250
//! queue_capacity = 16
//!
//! [tls]
//! certificate = "certs/server.pem"
//! private_key = "certs/server.key"
//! trust_anchor = "certs/ca.pem"
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent, so a partial file only needs to
//! name what it changes.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use radar_core::PumpOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::network::ServerSettings;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `network.bind_address` is not an IP address.
    #[error("invalid bind address {0:?}")]
    BindAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level server configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub radar: RadarConfig,
    #[serde(default)]
    pub tls: TlsConfig,
}

/// General server behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// How often the console display logs the current radar picture.
    #[serde(default = "default_display_interval_ms")]
    pub display_interval_ms: u64,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on a simulator's TLS handshake.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

/// Radar picture settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RadarConfig {
    /// How long a radar return stays on the display.
    #[serde(default = "default_retention_ms")]
    pub retention_ms: u64,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Capacity of each session's inbound and outbound queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// PEM files for the server identity and the pinned authority.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TlsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_anchor: Option<PathBuf>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_display_interval_ms() -> u64 {
    1000
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    6898
}
fn default_handshake_timeout_ms() -> u64 {
    10_000
}
fn default_retention_ms() -> u64 {
    5000
}
fn default_sweep_interval_ms() -> u64 {
    250
}
fn default_queue_capacity() -> usize {
    16
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            display_interval_ms: default_display_interval_ms(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            retention_ms: default_retention_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl AppConfig {
    /// Listener address from `[network]`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::BindAddress`] if `bind_address` does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .network
            .bind_address
            .parse()
            .map_err(|_| ConfigError::BindAddress(self.network.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.network.port))
    }

    /// Converts the file settings into runtime settings.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::bind_addr`].
    pub fn server_settings(&self) -> Result<ServerSettings, ConfigError> {
        let mut settings = ServerSettings::new(self.bind_addr()?);
        settings.retention = Duration::from_millis(self.radar.retention_ms);
        settings.sweep_interval = Duration::from_millis(self.radar.sweep_interval_ms.max(1));
        settings.pump = PumpOptions {
            queue_capacity: self.radar.queue_capacity,
            handshake_timeout: Duration::from_millis(self.network.handshake_timeout_ms),
            ..PumpOptions::default()
        };
        Ok(settings)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("radar-server-config-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_app_config_default_matches_documented_values() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.network.port, 6898);
        assert_eq!(cfg.radar.retention_ms, 5000);
        assert_eq!(cfg.radar.sweep_interval_ms, 250);
        assert_eq!(cfg.radar.queue_capacity, 16);
        assert_eq!(cfg.server.log_level, "info");
        assert!(cfg.tls.certificate.is_none());
    }

    #[test]
    fn test_partial_toml_fills_missing_fields_with_defaults() {
        let cfg: AppConfig = toml::from_str("[network]\nport = 7000\n").unwrap();

        assert_eq!(cfg.network.port, 7000);
        assert_eq!(cfg.network.bind_address, "0.0.0.0");
        assert_eq!(cfg.radar, RadarConfig::default());
    }

    #[test]
    fn test_server_settings_converts_units() {
        let mut cfg = AppConfig::default();
        cfg.network.bind_address = "127.0.0.1".into();
        cfg.radar.retention_ms = 2500;
        cfg.network.handshake_timeout_ms = 300;

        let settings = cfg.server_settings().unwrap();

        assert_eq!(settings.bind_addr, "127.0.0.1:6898".parse().unwrap());
        assert_eq!(settings.retention, Duration::from_millis(2500));
        assert_eq!(settings.pump.handshake_timeout, Duration::from_millis(300));
    }

    #[test]
    fn test_invalid_bind_address_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.network.bind_address = "radar.local".into();

        assert!(matches!(cfg.bind_addr(), Err(ConfigError::BindAddress(_))));
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let cfg = load_config(&temp_path("does-not-exist.toml")).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        // Arrange
        let path = temp_path("round-trip.toml");
        let mut cfg = AppConfig::default();
        cfg.network.port = 9100;
        cfg.tls.trust_anchor = Some(PathBuf::from("certs/ca.pem"));

        // Act
        save_config(&path, &cfg).unwrap();
        let restored = load_config(&path).unwrap();

        // Assert
        assert_eq!(cfg, restored);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let path = temp_path("malformed.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[network\nport = ").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
        let _ = std::fs::remove_file(&path);
    }
}
