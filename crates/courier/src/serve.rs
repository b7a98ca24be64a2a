// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve` command implementation.
//!
//! Opens the ledger, starts the dispatcher, re-submits jobs left behind by a
//! previous process, and keeps dispatching until SIGINT/SIGTERM.

use courier_config::model::CourierConfig;
use courier_core::CourierError;
use tracing::info;

use crate::engine::Engine;
use crate::shutdown;

/// Runs the `courier serve` command.
pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    info!(name = %config.service.name, "starting courier serve");

    #[cfg(feature = "prometheus")]
    let _prometheus = init_prometheus(&config);

    let engine = Engine::open(&config).await?;
    let cancel = shutdown::install_signal_handler();

    let result = serve_until(&engine, &config, &cancel).await;

    info!("stopping dispatcher");
    engine.close().await?;
    info!("courier serve shutdown complete");
    result
}

async fn serve_until(
    engine: &Engine,
    config: &CourierConfig,
    cancel: &tokio_util::sync::CancellationToken,
) -> Result<(), CourierError> {
    engine.coordinator.dispatcher().start()?;

    if config.recovery.enabled {
        let recovered = engine.coordinator.recover(config.recovery.grace_secs).await?;
        info!(
            jobs = recovered,
            grace_secs = config.recovery.grace_secs,
            "startup recovery complete"
        );
    } else {
        info!("startup recovery disabled by configuration");
    }

    info!("courier serve ready");
    cancel.cancelled().await;
    Ok(())
}

#[cfg(feature = "prometheus")]
fn init_prometheus(config: &CourierConfig) -> Option<courier_prometheus::PrometheusAdapter> {
    use tracing::warn;

    if !config.prometheus.enabled {
        info!("prometheus metrics disabled by configuration");
        return None;
    }
    match courier_prometheus::PrometheusAdapter::install(&config.prometheus) {
        Ok(adapter) => {
            info!(listen = %adapter.listen_addr(), "prometheus metrics enabled");
            Some(adapter)
        }
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            None
        }
    }
}
