// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring of ledger, provider, dispatcher and coordinator for one process.

use std::sync::Arc;

use courier_config::model::CourierConfig;
use courier_core::{CourierError, HealthStatus, LedgerAdapter, PluginAdapter};
use courier_dispatch::{CampaignCoordinator, CoordinatorConfig, Dispatcher};
use courier_storage::SqliteLedger;
use courier_whatsapp::WhatsAppProvider;
use tracing::{info, warn};

/// The running broadcast stack.
pub struct Engine {
    pub ledger: Arc<SqliteLedger>,
    pub coordinator: CampaignCoordinator,
    /// Provider health at startup.
    pub provider_health: HealthStatus,
}

impl Engine {
    /// Open the ledger and build the dispatch pipeline.
    ///
    /// The dispatcher is not started; it starts on the first submission.
    pub async fn open(config: &CourierConfig) -> Result<Self, CourierError> {
        let ledger = Arc::new(SqliteLedger::open(config.storage.clone()).await?);
        info!(path = %config.storage.database_path, "ledger opened");

        let provider = WhatsAppProvider::new(&config.whatsapp)?;
        let provider_health = provider.health_check().await?;
        if let HealthStatus::Unhealthy(reason) = &provider_health {
            warn!(%reason, "provider unhealthy, sends will fail until it is configured");
        }

        let dispatcher = Arc::new(Dispatcher::new(&config.dispatch, Arc::new(provider)));
        info!(
            per_window = config.dispatch.per_window,
            window_ms = config.dispatch.window_ms,
            "dispatcher configured"
        );

        let ledger_dyn: Arc<dyn LedgerAdapter> = ledger.clone();
        let coordinator =
            CampaignCoordinator::new(ledger_dyn, dispatcher, CoordinatorConfig::from(config));

        Ok(Self {
            ledger,
            coordinator,
            provider_health,
        })
    }

    /// Stop dispatching and checkpoint the ledger.
    pub async fn close(&self) -> Result<(), CourierError> {
        self.coordinator.shutdown().await?;
        self.ledger.close().await
    }
}

/// Open the ledger alone, for read-only projections.
pub async fn open_ledger(config: &CourierConfig) -> Result<SqliteLedger, CourierError> {
    SqliteLedger::open(config.storage.clone()).await
}
