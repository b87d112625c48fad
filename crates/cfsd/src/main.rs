//! cfsd — Cloud Foundry service discovery for Prometheus.
//!
//! Periodically lists the started apps of a Cloud Foundry deployment,
//! resolves each app's running instances to `host:port` scrape targets,
//! and writes them as a Prometheus `file_sd` JSON file.
//!
//! # Usage
//!
//! ```text
//! cfsd --api.address https://api.sys.example.com \
//!      --api.id prometheus --api.secret s3cret \
//!      --update.frequency 3 --out.file /etc/prometheus/cf_targets.json
//! ```
//!
//! Every flag can also be given through its environment variable
//! (`API_ADDRESS`, `CF_CLIENT_ID`, `CF_CLIENT_SECRET`, `SKIP_SSL`,
//! `FREQUENCY`, `OUTPUT_FILE`, `PORT`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cfsd_core::{ConfigOverrides, FileConfig, SdConfig};
use cfsd_platform::{CfClient, CfClientConfig};
use cfsd_refresh::{RefreshController, Refresher};

const DEFAULT_LOG_FILTER: &str = "info,cfsd=debug";

#[derive(Parser, Debug)]
#[command(name = "cfsd", version, about = "Cloud Foundry target generator for Prometheus service discovery")]
struct Cli {
    /// Cloud Foundry API address.
    #[arg(long = "api.address", env = "API_ADDRESS")]
    api_address: Option<String>,

    /// UAA client id.
    #[arg(long = "api.id", env = "CF_CLIENT_ID")]
    client_id: Option<String>,

    /// UAA client secret.
    #[arg(long = "api.secret", env = "CF_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Skip TLS certificate verification.
    #[arg(
        long = "skip.ssl",
        env = "SKIP_SSL",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = parse_bool
    )]
    skip_ssl: Option<bool>,

    /// Refresh interval in minutes [default: 3].
    #[arg(long = "update.frequency", env = "FREQUENCY")]
    frequency: Option<u64>,

    /// Path of the generated targets file [default: /tmp/cf_targets.json].
    #[arg(long = "out.file", env = "OUTPUT_FILE")]
    output_file: Option<PathBuf>,

    /// Port for the HTTP status endpoints [default: 8080].
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Optional TOML config file; flags and env override it.
    #[arg(long, env = "CFSD_CONFIG")]
    config: Option<PathBuf>,

    /// Log as JSON lines.
    #[arg(
        long = "log.json",
        env = "LOG_JSON",
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        default_value = "false",
        value_parser = parse_bool
    )]
    log_json: bool,
}

/// Boolean flag values: `1`, `t`, `true` and `0`, `f`, `false` in any
/// case, plus `y`/`yes`, `n`/`no` and `on`/`off`.
fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "y" | "yes" | "on" => Ok(true),
        "0" | "f" | "false" | "n" | "no" | "off" => Ok(false),
        _ => Err(format!("invalid boolean `{value}`")),
    }
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            api_address: self.api_address.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            skip_ssl: self.skip_ssl,
            frequency_minutes: self.frequency,
            output_file: self.output_file.clone(),
            port: self.port,
        }
    }

    fn resolve(&self) -> anyhow::Result<SdConfig> {
        let file = match &self.config {
            Some(path) => Some(
                FileConfig::from_file(path)
                    .with_context(|| format!("loading config file {}", path.display()))?,
            ),
            None => None,
        };
        Ok(SdConfig::resolve(file, self.overrides())?)
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = cli.resolve()?;
    info!(
        api = %config.api.address,
        interval_secs = config.refresh.interval.as_secs(),
        output = %config.output_file.display(),
        "cfsd starting"
    );

    run(config).await
}

async fn run(config: SdConfig) -> anyhow::Result<()> {
    // ── Platform client ────────────────────────────────────────

    let client = CfClient::connect(CfClientConfig::from(&config.api))
        .await
        .with_context(|| format!("connecting to {}", config.api.address))?;
    info!(api = %client.api_address(), "platform client ready");

    // ── Refresh controller ─────────────────────────────────────

    let refresher = Refresher::from_config(Arc::new(client), &config);
    let controller = RefreshController::new(refresher, &config.refresh);
    let router = cfsd_http::build_router(controller.subscribe());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server_shutdown = shutdown_rx.clone();
    let mut refresh = tokio::spawn(controller.run(shutdown_rx));

    // ── HTTP server ────────────────────────────────────────────

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "HTTP server starting");

    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await
    });

    // ── Wait for Ctrl-C or a fatal refresh error ───────────────

    let finished = tokio::select! {
        joined = &mut refresh => Some(joined),
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
            None
        }
    };
    let outcome = match finished {
        Some(joined) => joined,
        None => {
            let _ = shutdown_tx.send(true);
            refresh.await
        }
    };

    let _ = shutdown_tx.send(true);
    server.await?.context("HTTP server failed")?;

    match outcome {
        Ok(Ok(())) => {
            info!("cfsd stopped");
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, "refresh stopped");
            Err(e.into())
        }
        Err(e) => Err(anyhow::Error::new(e).context("refresh task panicked")),
    }
}
