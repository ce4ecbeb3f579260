//! TOML-based configuration for the radar client.
//!
//! ```toml
//! [client]
//! log_level = "info"
//! queue_capacity = 16
//!
//! [network]
//! server_host = "127.0.0.1"
//! server_port = 6898
//! server_name = "radar.local"
//! handshake_timeout_ms = 10000
//!
//! [telemetry]
//! flight_number = "OPR001"
//! squawk = "1200"
//! com_frequency_khz = 122800
//! latitude = 47.4502
//! longitude = -122.3088
//! altitude_ft = 5000.0
//! ground_speed_kt = 250.0
//! ground_track_deg = 340.0
//! period_ms = 1000
//!
//! [tls]
//! certificate = "certs/client.pem"
//! private_key = "certs/client.key"
//! trust_anchor = "certs/ca.pem"
//! ```
//!
//! The squawk is written the way a pilot dials it (four octal digits) and
//! stored on the wire as binary-coded octal.  A missing file yields the
//! defaults; missing fields fall back individually.

use std::path::{Path, PathBuf};
use std::time::Duration;

use radar_core::{PumpOptions, Squawk};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::telemetry::PlaneTelemetry;
use crate::infrastructure::network::ClientSettings;

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

    /// `telemetry.squawk` is not four octal digits.
    #[error("invalid squawk {0:?}: expected four digits 0-7")]
    Squawk(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub tls: TlsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Capacity of the outbound and inbound queues.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Where the radar server is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// DNS name or IP literal.
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// TLS server name; defaults to `server_host`.  The pinned verifier does
    /// not check it against the certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

/// Starting state of the synthetic flight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryConfig {
    #[serde(default = "default_flight_number")]
    pub flight_number: String,
    /// Four octal digits, as dialled on the transponder.
    #[serde(default = "default_squawk")]
    pub squawk: String,
    #[serde(default = "default_com_frequency_khz")]
    pub com_frequency_khz: i32,
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
    #[serde(default = "default_altitude_ft")]
    pub altitude_ft: f64,
    #[serde(default = "default_ground_speed_kt")]
    pub ground_speed_kt: f64,
    #[serde(default = "default_ground_track_deg")]
    pub ground_track_deg: f64,
    /// Interval between position reports.
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
}

/// PEM files for the client identity and the pinned authority.
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
fn default_queue_capacity() -> usize {
    16
}
fn default_server_host() -> String {
    "127.0.0.1".to_string()
}
fn default_server_port() -> u16 {
    6898
}
fn default_handshake_timeout_ms() -> u64 {
    10_000
}
fn default_flight_number() -> String {
    "OPR001".to_string()
}
fn default_squawk() -> String {
    "1200".to_string()
}
fn default_com_frequency_khz() -> i32 {
    122_800
}
fn default_latitude() -> f64 {
    47.4502
}
fn default_longitude() -> f64 {
    -122.3088
}
fn default_altitude_ft() -> f64 {
    5_000.0
}
fn default_ground_speed_kt() -> f64 {
    250.0
}
fn default_ground_track_deg() -> f64 {
    340.0
}
fn default_period_ms() -> u64 {
    1000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            server_port: default_server_port(),
            server_name: None,
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            flight_number: default_flight_number(),
            squawk: default_squawk(),
            com_frequency_khz: default_com_frequency_khz(),
            latitude: default_latitude(),
            longitude: default_longitude(),
            altitude_ft: default_altitude_ft(),
            ground_speed_kt: default_ground_speed_kt(),
            ground_track_deg: default_ground_track_deg(),
            period_ms: default_period_ms(),
        }
    }
}

/// Parses a dialled transponder code ("7500") into its binary-coded octal
/// form (`0x7500`).
///
/// # Errors
///
/// [`ConfigError::Squawk`] unless `text` is exactly four digits 0-7.
pub fn parse_squawk(text: &str) -> Result<Squawk, ConfigError> {
    let valid = text.len() == 4 && text.bytes().all(|b| (b'0'..=b'7').contains(&b));
    if !valid {
        return Err(ConfigError::Squawk(text.to_string()));
    }
    u16::from_str_radix(text, 16)
        .map(Squawk)
        .map_err(|_| ConfigError::Squawk(text.to_string()))
}

impl AppConfig {
    /// Runtime settings for the client driver.
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            server_name: self.network.server_name.clone(),
            pump: PumpOptions {
                queue_capacity: self.client.queue_capacity,
                handshake_timeout: Duration::from_millis(self.network.handshake_timeout_ms),
                ..PumpOptions::default()
            },
        }
    }

    /// Initial telemetry sample for the synthetic flight.
    ///
    /// # Errors
    ///
    /// See [`parse_squawk`].
    pub fn initial_telemetry(&self) -> Result<PlaneTelemetry, ConfigError> {
        let t = &self.telemetry;
        Ok(PlaneTelemetry {
            flight_number: t.flight_number.clone(),
            latitude: t.latitude,
            longitude: t.longitude,
            altitude_ft: t.altitude_ft,
            com_frequency_khz: t.com_frequency_khz,
            transponder: i32::from(parse_squawk(&t.squawk)?.0),
            ground_track_deg: t.ground_track_deg,
            ground_speed_kt: t.ground_speed_kt,
        })
    }

    pub fn report_period(&self) -> Duration {
        Duration::from_millis(self.telemetry.period_ms.max(1))
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
