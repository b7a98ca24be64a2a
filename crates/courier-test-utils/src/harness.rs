// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end campaign testing.
//!
//! `TestHarness` assembles a temp SQLite ledger, a dispatcher over a
//! [`MockProvider`], and a coordinator. The temp directory lives as long
//! as the harness.

use std::sync::Arc;
use std::time::Duration;

use courier_config::model::{CourierConfig, DispatchConfig, RetryConfig, StorageConfig};
use courier_core::{Campaign, CampaignId, CourierError, LedgerAdapter};
use courier_dispatch::{
    CampaignCoordinator, CampaignReceipt, CampaignRequest, CoordinatorConfig, Dispatcher,
};
use courier_storage::SqliteLedger;

use crate::mock_provider::MockProvider;

/// Template name used by [`TestHarness::send`].
pub const TEST_TEMPLATE: &str = "order_update";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    provider: Option<MockProvider>,
    dispatch: DispatchConfig,
    retry: RetryConfig,
    dedupe_recipients: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            provider: None,
            // Short windows keep real-time tests fast.
            dispatch: DispatchConfig {
                window_ms: 20,
                per_window: 20,
            },
            retry: RetryConfig {
                max_attempts: 1,
                initial_backoff_ms: 10,
                backoff_multiplier: 2.0,
                max_backoff_ms: 100,
            },
            dedupe_recipients: false,
        }
    }

    pub fn with_provider(mut self, provider: MockProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the rate cap: `per_window` calls every `window_ms`.
    pub fn with_rate(mut self, per_window: usize, window_ms: u64) -> Self {
        self.dispatch = DispatchConfig {
            window_ms,
            per_window,
        };
        self
    }

    /// Allow up to `max_attempts` attempts per job with a short backoff.
    pub fn with_retries(mut self, max_attempts: u32) -> Self {
        self.retry.max_attempts = max_attempts;
        self
    }

    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe_recipients = dedupe;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, CourierError> {
        let temp_dir = tempfile::TempDir::new().map_err(CourierError::storage)?;
        let db_path = temp_dir.path().join("test.db");
        let storage_config = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };

        let mut config = CourierConfig {
            storage: storage_config.clone(),
            dispatch: self.dispatch.clone(),
            retry: self.retry,
            ..CourierConfig::default()
        };
        config.campaign.dedupe_recipients = self.dedupe_recipients;

        let ledger: Arc<dyn LedgerAdapter> = Arc::new(SqliteLedger::open(storage_config).await?);
        let provider = Arc::new(self.provider.unwrap_or_default());
        let dispatcher = Arc::new(Dispatcher::new(&config.dispatch, provider.clone()));
        let coordinator = CampaignCoordinator::new(
            Arc::clone(&ledger),
            Arc::clone(&dispatcher),
            CoordinatorConfig::from(&config),
        );

        Ok(TestHarness {
            provider,
            ledger,
            dispatcher,
            coordinator,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with a mock provider and temp storage.
pub struct TestHarness {
    /// The mock provider behind the dispatcher.
    pub provider: Arc<MockProvider>,
    /// SQLite ledger (temp DB, cleaned up on drop).
    pub ledger: Arc<dyn LedgerAdapter>,
    pub dispatcher: Arc<Dispatcher>,
    pub coordinator: CampaignCoordinator,
    /// Configuration the stack was built from.
    pub config: CourierConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Create a campaign for `recipients` using [`TEST_TEMPLATE`].
    pub async fn send(&self, recipients: &[&str]) -> Result<CampaignReceipt, CourierError> {
        self.coordinator
            .create_campaign(CampaignRequest {
                recipients: recipients.iter().map(|r| r.to_string()).collect(),
                template_name: TEST_TEMPLATE.to_string(),
                language_code: None,
                components: None,
            })
            .await
    }

    /// Wait (at most 10 s) for a campaign to reach a terminal state.
    pub async fn wait(&self, id: &CampaignId) -> Result<Campaign, CourierError> {
        let limit = Duration::from_secs(10);
        tokio::time::timeout(
            limit,
            self.coordinator
                .wait_for_completion(id, Duration::from_millis(5)),
        )
        .await
        .map_err(|_| CourierError::Timeout { duration: limit })?
    }
}
