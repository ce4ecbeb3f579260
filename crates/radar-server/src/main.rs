//! OpenRadar server entry point.
//!
//! Listens for flight-simulator clients over mutually authenticated TLS and
//! periodically logs the current radar picture.
//!
//! # Usage
//!
//! ```text
//! radar-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>         TOML configuration file [default: radar-server.toml]
//!   --init-config           Write a default configuration file and exit
//!   --bind <IP>             Override network.bind_address
//!   --port <PORT>           Override network.port
//!   --certificate <PATH>    Server certificate chain (PEM)
//!   --private-key <PATH>    Server private key (PEM)
//!   --trust-anchor <PATH>   Pinned CA certificate (PEM or DER)
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable              | Overrides          |
//! |-----------------------|--------------------|
//! | `RADAR_SERVER_CONFIG` | `--config`         |
//! | `RADAR_TLS_CERT`      | `--certificate`    |
//! | `RADAR_TLS_KEY`       | `--private-key`    |
//! | `RADAR_TRUST_ANCHOR`  | `--trust-anchor`   |
//! | `RUST_LOG`            | `server.log_level` |

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use radar_core::{Identity, TrustAnchor};
use radar_server::application::radar_returns::RadarReturn;
use radar_server::infrastructure::network::RadarServer;
use radar_server::infrastructure::storage::config::{load_config, save_config, AppConfig};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// OpenRadar display server.
#[derive(Debug, Parser)]
#[command(name = "radar-server", about = "Radar display server for OpenRadar simulator clients", version)]
struct Cli {
    /// TOML configuration file.  A missing file means "all defaults".
    #[arg(long, default_value = "radar-server.toml", env = "RADAR_SERVER_CONFIG")]
    config: PathBuf,

    /// Write the effective configuration to `--config` and exit.
    #[arg(long)]
    init_config: bool,

    #[arg(long)]
    bind: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long, env = "RADAR_TLS_CERT")]
    certificate: Option<PathBuf>,

    #[arg(long, env = "RADAR_TLS_KEY")]
    private_key: Option<PathBuf>,

    #[arg(long, env = "RADAR_TRUST_ANCHOR")]
    trust_anchor: Option<PathBuf>,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration.
    fn apply(&self, cfg: &mut AppConfig) {
        if let Some(bind) = &self.bind {
            cfg.network.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            cfg.network.port = port;
        }
        if self.certificate.is_some() {
            cfg.tls.certificate = self.certificate.clone();
        }
        if self.private_key.is_some() {
            cfg.tls.private_key = self.private_key.clone();
        }
        if self.trust_anchor.is_some() {
            cfg.tls.trust_anchor = self.trust_anchor.clone();
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut cfg = load_config(&cli.config).with_context(|| format!("loading {}", cli.config.display()))?;
    cli.apply(&mut cfg);

    if cli.init_config {
        save_config(&cli.config, &cfg).with_context(|| format!("writing {}", cli.config.display()))?;
        println!("wrote {}", cli.config.display());
        return Ok(());
    }

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.server.log_level)))
        .init();

    let (identity, anchor) = load_tls_material(&cfg)?;
    let settings = cfg.server_settings()?;
    let server = RadarServer::bind(settings, &identity, Arc::new(anchor)).await?;

    info!(
        "OpenRadar server started: listening on {}, retention {:?}",
        server.local_addr(),
        settings.retention
    );

    let mut display = tokio::time::interval(Duration::from_millis(cfg.server.display_interval_ms.max(1)));
    display.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!("received Ctrl+C; shutting down"),
                    Err(e) => warn!("failed to listen for Ctrl+C: {e}; shutting down"),
                }
                break;
            }
            _ = display.tick() => show_radar_picture(&server),
        }
    }

    server.stop().await;
    Ok(())
}

fn load_tls_material(cfg: &AppConfig) -> anyhow::Result<(Identity, TrustAnchor)> {
    let cert_path = required_path(cfg.tls.certificate.as_deref(), "tls.certificate")?;
    let key_path = required_path(cfg.tls.private_key.as_deref(), "tls.private_key")?;
    let anchor_path = required_path(cfg.tls.trust_anchor.as_deref(), "tls.trust_anchor")?;

    let chain = std::fs::read(cert_path).with_context(|| format!("reading {}", cert_path.display()))?;
    let key = std::fs::read(key_path).with_context(|| format!("reading {}", key_path.display()))?;
    let ca = std::fs::read(anchor_path).with_context(|| format!("reading {}", anchor_path.display()))?;

    let identity = Identity::from_pem(&chain, &key).context("loading server identity")?;
    let anchor = TrustAnchor::from_bytes(&ca).context("loading trust anchor")?;
    Ok((identity, anchor))
}

fn required_path<'a>(path: Option<&'a Path>, key: &str) -> anyhow::Result<&'a Path> {
    path.with_context(|| format!("{key} is not set (config file, command line or environment)"))
}

// ── Console display ───────────────────────────────────────────────────────────

/// Newest return per call sign together with how many returns that aircraft
/// has in the window.  Sorted by call sign.
fn latest_per_call_sign(returns: &[RadarReturn]) -> Vec<(RadarReturn, usize)> {
    let mut targets: HashMap<String, (RadarReturn, usize)> = HashMap::new();
    for r in returns {
        targets
            .entry(r.update.call_sign.as_str().to_owned())
            .and_modify(|(latest, trail)| {
                *trail += 1;
                if r.received >= latest.received {
                    *latest = *r;
                }
            })
            .or_insert((*r, 1));
    }
    let mut targets: Vec<_> = targets.into_values().collect();
    targets.sort_by(|a, b| a.0.update.call_sign.as_str().cmp(b.0.update.call_sign.as_str()));
    targets
}

fn show_radar_picture(server: &RadarServer) {
    let now = Instant::now();
    let returns = server.store().snapshot();
    info!(
        sessions = server.sessions().len(),
        returns = returns.len(),
        "radar picture"
    );

    for (latest, trail) in latest_per_call_sign(&returns) {
        let u = &latest.update;
        let origin = server
            .resolve_origin(&latest)
            .and_then(|s| s.peer())
            .map_or_else(|| "disconnected".to_string(), |p| p.to_string());
        info!(
            "  {:<8} {} {:07.3} {} FL{:03.0} {:3.0}kt {:03.0}° trail={} age={:?} from {}",
            u.call_sign.as_str(),
            u.squawk,
            u.frequency_mhz(),
            u.coords,
            u.altitude_ft / 100.0,
            u.ground_speed_kt,
            u.ground_track_deg,
            trail,
            latest.age_at(now),
            origin
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use radar_core::{CallSign, LatLng, PositionUpdate, Squawk};
    use uuid::Uuid;

    fn radar_return(call_sign: &str, received: Instant) -> RadarReturn {
        RadarReturn::new(
            PositionUpdate {
                call_sign: CallSign::new(call_sign).unwrap(),
                squawk: Squawk::VFR,
                frequency_khz: 122_800,
                coords: LatLng::new(0.0, 0.0),
                altitude_ft: 1_500.0,
                ground_speed_kt: 90.0,
                ground_track_deg: 0.0,
            },
            received,
            Uuid::new_v4(),
        )
    }

    #[test]
    fn test_cli_defaults_use_local_config_file() {
        let cli = Cli::parse_from(["radar-server"]);
        assert!(!cli.init_config);
        assert!(cli.port.is_none());
    }

    #[test]
    fn test_cli_overrides_replace_file_values() {
        // Arrange
        let cli = Cli::parse_from(["radar-server", "--port", "7100", "--trust-anchor", "ca.pem"]);
        let mut cfg = AppConfig::default();

        // Act
        cli.apply(&mut cfg);

        // Assert
        assert_eq!(cfg.network.port, 7100);
        assert_eq!(cfg.tls.trust_anchor, Some(PathBuf::from("ca.pem")));
        assert_eq!(cfg.network.bind_address, "0.0.0.0");
    }

    #[test]
    fn test_missing_tls_path_is_reported_by_key() {
        let err = load_tls_material(&AppConfig::default()).unwrap_err();
        assert!(err.to_string().contains("tls.certificate"));
    }

    #[test]
    fn test_latest_per_call_sign_collapses_trail() {
        let t0 = Instant::now();
        let returns = vec![
            radar_return("N1", t0),
            radar_return("N2", t0),
            radar_return("N1", t0 + Duration::from_secs(1)),
        ];

        let targets = latest_per_call_sign(&returns);

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].0.received, t0 + Duration::from_secs(1));
        assert_eq!(targets[0].1, 2);
        assert_eq!(targets[1].1, 1);
    }
}
