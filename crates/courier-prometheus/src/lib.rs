// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics adapter for the Courier broadcast engine.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. When enabled,
//! metrics are scraped from the exporter's own HTTP listener.

pub mod recording;

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use courier_config::model::PrometheusConfig;
use courier_core::CourierError;

pub use recording::{
    record_campaign_created, record_campaign_finished, record_dispatch, record_drain_batch,
    record_provider_latency, record_retry, register_metrics, set_queue_depth,
};

/// Prometheus metrics adapter.
///
/// Installs the Prometheus recorder globally and serves the text format
/// on the configured listen address.
pub struct PrometheusAdapter {
    listen: SocketAddr,
}

impl PrometheusAdapter {
    /// Install the recorder and spawn the scrape listener.
    ///
    /// Only one recorder can be installed per process; a second call fails.
    /// Must be called from within a Tokio runtime.
    pub fn install(config: &PrometheusConfig) -> Result<Self, CourierError> {
        let listen: SocketAddr = config.listen.parse().map_err(|e| {
            CourierError::Config(format!("invalid prometheus.listen '{}': {e}", config.listen))
        })?;

        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(listen)
            .build()
            .map_err(|e| {
                CourierError::Internal(format!("failed to build Prometheus recorder: {e}"))
            })?;
        metrics::set_global_recorder(recorder).map_err(|e| {
            CourierError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        tokio::spawn(async move {
            if let Err(e) = exporter.await {
                tracing::error!(error = ?e, "prometheus exporter stopped");
            }
        });

        register_metrics();
        tracing::info!(%listen, "prometheus metrics recorder installed");

        Ok(Self { listen })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen
    }
}
