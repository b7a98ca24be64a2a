// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the LedgerAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use courier_config::model::StorageConfig;
use courier_core::{
    AdapterType, Campaign, CampaignId, CampaignStatus, CourierError, HealthStatus, Job, JobId,
    JobStatus, LedgerAdapter, NewCampaign, NewJob, PluginAdapter, SendOutcome,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed campaign and job ledger.
///
/// The database is opened lazily by [`LedgerAdapter::initialize`].
pub struct SqliteLedger {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteLedger {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Construct and initialize in one step.
    pub async fn open(config: StorageConfig) -> Result<Self, CourierError> {
        let ledger = Self::new(config);
        ledger.initialize().await?;
        Ok(ledger)
    }

    fn db(&self) -> Result<&Database, CourierError> {
        self.db.get().ok_or_else(|| CourierError::Storage {
            source: "ledger not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteLedger {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Ledger
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerAdapter for SqliteLedger {
    async fn initialize(&self) -> Result<(), CourierError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| CourierError::Storage {
            source: "ledger already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite ledger initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), CourierError> {
        self.db()?.close().await
    }

    // --- Campaign ledger ---

    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Campaign, CourierError> {
        queries::campaigns::create_campaign(self.db()?, campaign).await
    }

    async fn mark_campaign_failed(
        &self,
        id: &CampaignId,
        reason: &str,
    ) -> Result<(), CourierError> {
        queries::campaigns::mark_failed(self.db()?, id, reason).await
    }

    async fn get_campaign(&self, id: &CampaignId) -> Result<Option<Campaign>, CourierError> {
        queries::campaigns::get_campaign(self.db()?, id).await
    }

    async fn list_campaigns(
        &self,
        status: Option<CampaignStatus>,
        limit: Option<u32>,
    ) -> Result<Vec<Campaign>, CourierError> {
        queries::campaigns::list_campaigns(self.db()?, status, limit).await
    }

    // --- Job ledger ---

    async fn insert_jobs(
        &self,
        campaign_id: &CampaignId,
        jobs: Vec<NewJob>,
    ) -> Result<Vec<Job>, CourierError> {
        queries::jobs::insert_jobs(self.db()?, campaign_id, jobs).await
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, CourierError> {
        queries::jobs::get_job(self.db()?, id).await
    }

    async fn list_jobs(
        &self,
        campaign_id: &CampaignId,
        status: Option<JobStatus>,
    ) -> Result<Vec<Job>, CourierError> {
        queries::jobs::list_jobs(self.db()?, campaign_id, status).await
    }

    async fn record_outcome(
        &self,
        id: &JobId,
        outcome: &SendOutcome,
    ) -> Result<Option<Campaign>, CourierError> {
        queries::jobs::record_outcome(self.db()?, id, outcome).await
    }

    async fn record_retry(
        &self,
        id: &JobId,
        error: &str,
    ) -> Result<Option<Campaign>, CourierError> {
        queries::jobs::record_retry(self.db()?, id, error).await
    }

    async fn stale_jobs(&self, older_than_secs: u64) -> Result<Vec<Job>, CourierError> {
        queries::jobs::stale_jobs(self.db()?, older_than_secs).await
    }
}
