// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ledger adapter trait for the durable campaign and job records.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Campaign, CampaignId, CampaignStatus, Job, JobId, JobStatus, NewCampaign, NewJob,
    SendOutcome,
};

/// Adapter for the persisted campaign and job ledgers.
///
/// The ledger is the source of truth; the dispatcher queue only holds
/// references to rows stored here. Every counter mutation must be applied
/// atomically inside the backend, never as fetch-compute-write by callers.
#[async_trait]
pub trait LedgerAdapter: PluginAdapter {
    /// Opens the backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), CourierError>;

    /// Flushes pending writes and releases connections.
    async fn close(&self) -> Result<(), CourierError>;

    // --- Campaign ledger ---

    /// Inserts a campaign in `queued` state with `queued == total`.
    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Campaign, CourierError>;

    /// Moves a still-`queued` campaign to `failed`, recording why.
    async fn mark_campaign_failed(
        &self,
        id: &CampaignId,
        reason: &str,
    ) -> Result<(), CourierError>;

    async fn get_campaign(&self, id: &CampaignId) -> Result<Option<Campaign>, CourierError>;

    /// Lists campaigns newest first, optionally filtered by status.
    async fn list_campaigns(
        &self,
        status: Option<CampaignStatus>,
        limit: Option<u32>,
    ) -> Result<Vec<Campaign>, CourierError>;

    // --- Job ledger ---

    /// Inserts all jobs of a campaign in one transaction, in input order.
    async fn insert_jobs(
        &self,
        campaign_id: &CampaignId,
        jobs: Vec<NewJob>,
    ) -> Result<Vec<Job>, CourierError>;

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, CourierError>;

    /// Lists a campaign's jobs in creation order, optionally filtered by status.
    async fn list_jobs(
        &self,
        campaign_id: &CampaignId,
        status: Option<JobStatus>,
    ) -> Result<Vec<Job>, CourierError>;

    /// Settles a job with its final outcome and folds it into the campaign.
    ///
    /// Returns the updated campaign, or `None` if the job was already
    /// terminal (the call is then a no-op).
    async fn record_outcome(
        &self,
        id: &JobId,
        outcome: &SendOutcome,
    ) -> Result<Option<Campaign>, CourierError>;

    /// Records a failed attempt that will be retried.
    ///
    /// The job becomes `processing`; campaign counters are untouched.
    /// Returns `None` if the job was already terminal.
    async fn record_retry(
        &self,
        id: &JobId,
        error: &str,
    ) -> Result<Option<Campaign>, CourierError>;

    /// Non-terminal jobs not touched for at least `older_than_secs`, oldest first.
    ///
    /// Empty while any job in the ledger was touched more recently than
    /// that, since a live process may still hold the open jobs in its queue.
    async fn stale_jobs(&self, older_than_secs: u64) -> Result<Vec<Job>, CourierError>;
}
