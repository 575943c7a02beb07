//! Gatekeeper daemon.
//!
//! ```text
//!   load balancer / operator
//!            │
//!            ▼
//!   ┌──────────────────┐      ┌──────────────────────────────┐
//!   │  HealthServer    │─────▶│        SecurityService        │
//!   │  /health ...     │      │  auth gate · csrf · headers   │
//!   └──────────────────┘      │  health monitor · client      │
//!                             └──────────────┬───────────────┘
//!                                            │ probes
//!                                            ▼
//!                                     dependencies
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use gatekeeper::config::{load_config, GatekeeperConfig};
use gatekeeper::lifecycle::signals::wait_for_signal;
use gatekeeper::observability::{logging, metrics, LogLevel, StructuredLogger};
use gatekeeper::{HealthServer, InitOptions, SecurityService};

#[derive(Parser)]
#[command(name = "gatekeeper", version)]
#[command(about = "Security and health-monitoring service", long_about = None)]
struct Args {
    /// Path to the TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip the startup health check.
    #[arg(long)]
    skip_health_checks: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatekeeperConfig::default(),
    };

    logging::init_subscriber(&config.observability)?;

    tracing::info!(
        version = %config.service.version,
        environment = %config.environment,
        bind_address = %config.server.bind_address,
        dependencies = config.health.dependencies.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to install metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let level = config
        .observability
        .log_level
        .parse::<LogLevel>()
        .unwrap_or(LogLevel::Info);
    let listener = HealthServer::bind(&config.server.bind_address).await?;
    let service = Arc::new(SecurityService::new(config, StructuredLogger::tracing(level)));

    service
        .initialize(InitOptions {
            skip_health_checks: args.skip_health_checks,
        })
        .await?;

    HealthServer::new(service.clone())
        .run(listener, wait_for_signal())
        .await?;

    service.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
