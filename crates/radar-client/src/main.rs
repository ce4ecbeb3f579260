//! OpenRadar client entry point.
//!
//! Connects to a radar server and reports a synthetic aircraft's position on
//! a fixed period until Ctrl+C.
//!
//! # Usage
//!
//! ```text
//! radar-client [OPTIONS]
//!
//! Options:
//!   --config <PATH>         TOML configuration file [default: radar-client.toml]
//!   --init-config           Write the effective configuration and exit
//!   --host <HOST>           Override network.server_host
//!   --port <PORT>           Override network.server_port
//!   --call-sign <CS>        Override telemetry.flight_number
//!   --squawk <CODE>         Override telemetry.squawk (four octal digits)
//!   --certificate <PATH>    Client certificate chain (PEM)
//!   --private-key <PATH>    Client private key (PEM)
//!   --trust-anchor <PATH>   Pinned CA certificate (PEM or DER)
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable              | Overrides          |
//! |-----------------------|--------------------|
//! | `RADAR_CLIENT_CONFIG` | `--config`         |
//! | `RADAR_SERVER_HOST`   | `--host`           |
//! | `RADAR_TLS_CERT`      | `--certificate`    |
//! | `RADAR_TLS_KEY`       | `--private-key`    |
//! | `RADAR_TRUST_ANCHOR`  | `--trust-anchor`   |
//! | `RUST_LOG`            | `client.log_level` |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use radar_client::application::telemetry::{PositionReporter, SyntheticFlight};
use radar_client::infrastructure::network::RadarClient;
use radar_client::infrastructure::storage::config::{load_config, save_config, AppConfig};
use radar_core::{Identity, TrustAnchor};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// OpenRadar simulator client.
#[derive(Debug, Parser)]
#[command(name = "radar-client", about = "Streams aircraft position telemetry to an OpenRadar server", version)]
struct Cli {
    /// TOML configuration file.  A missing file means "all defaults".
    #[arg(long, default_value = "radar-client.toml", env = "RADAR_CLIENT_CONFIG")]
    config: PathBuf,

    /// Write the effective configuration to `--config` and exit.
    #[arg(long)]
    init_config: bool,

    #[arg(long, env = "RADAR_SERVER_HOST")]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    call_sign: Option<String>,

    #[arg(long)]
    squawk: Option<String>,

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
        if let Some(host) = &self.host {
            cfg.network.server_host = host.clone();
        }
        if let Some(port) = self.port {
            cfg.network.server_port = port;
        }
        if let Some(call_sign) = &self.call_sign {
            cfg.telemetry.flight_number = call_sign.clone();
        }
        if let Some(squawk) = &self.squawk {
            cfg.telemetry.squawk = squawk.clone();
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
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.client.log_level)))
        .init();

    let initial = cfg.initial_telemetry()?;
    let (identity, anchor) = load_tls_material(&cfg)?;
    let client = Arc::new(RadarClient::new(cfg.client_settings(), &identity, Arc::new(anchor))?);

    let host = cfg.network.server_host.clone();
    let port = cfg.network.server_port;
    client
        .connect(&host, port)
        .await
        .with_context(|| format!("connecting to {host}:{port}"))?;
    info!(
        "reporting {} every {:?} (squawk {})",
        initial.flight_number,
        cfg.report_period(),
        cfg.telemetry.squawk
    );

    let cancel = CancellationToken::new();

    // Drain whatever the server sends; the radar→sim direction carries no
    // packet kinds yet, so this only logs.
    let inbound = tokio::spawn({
        let client = Arc::clone(&client);
        async move {
            while let Some(packet) = client.recv().await {
                info!(kind = %packet.kind(), "packet from radar: {packet:?}");
            }
        }
    });

    let reporter = PositionReporter::new(Arc::clone(&client));
    let mut flight = SyntheticFlight::new(initial);
    tokio::select! {
        _ = reporter.run(&mut flight, cfg.report_period(), cancel.clone()) => {
            warn!("connection to radar server lost");
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("received Ctrl+C; disconnecting"),
                Err(e) => warn!("failed to listen for Ctrl+C: {e}; disconnecting"),
            }
            cancel.cancel();
        }
    }

    client.disconnect().await;
    if let Err(e) = inbound.await {
        warn!("inbound task failed: {e}");
    }
    Ok(())
}

fn load_tls_material(cfg: &AppConfig) -> anyhow::Result<(Identity, TrustAnchor)> {
    let cert_path = required_path(cfg.tls.certificate.as_deref(), "tls.certificate")?;
    let key_path = required_path(cfg.tls.private_key.as_deref(), "tls.private_key")?;
    let anchor_path = required_path(cfg.tls.trust_anchor.as_deref(), "tls.trust_anchor")?;

    let chain = std::fs::read(cert_path).with_context(|| format!("reading {}", cert_path.display()))?;
    let key = std::fs::read(key_path).with_context(|| format!("reading {}", key_path.display()))?;
    let ca = std::fs::read(anchor_path).with_context(|| format!("reading {}", anchor_path.display()))?;

    let identity = Identity::from_pem(&chain, &key).context("loading client identity")?;
    let anchor = TrustAnchor::from_bytes(&ca).context("loading trust anchor")?;
    Ok((identity, anchor))
}

fn required_path<'a>(path: Option<&'a Path>, key: &str) -> anyhow::Result<&'a Path> {
    path.with_context(|| format!("{key} is not set (config file, command line or environment)"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
