// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign coordinator.
//!
//! Accepts a campaign request, normalizes and fans recipients out into Job
//! rows and dispatcher submissions, and returns before anything is sent.
//! One tracker task per campaign then folds outcomes back into the ledger
//! as they arrive, scheduling retries when the policy allows.
//!
//! Campaign counters are only ever changed by the ledger's atomic
//! `record_outcome`, so completion is detected from the row that update
//! returns rather than from any count held here.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use courier_config::model::CourierConfig;
use courier_core::recipient::normalize_checked;
use courier_core::{
    Campaign, CampaignId, CampaignStatus, CourierError, Job, JobId, JobStatus, LedgerAdapter,
    NewCampaign, NewJob, SendOutcome,
};

use crate::dispatcher::{CANCELLED, DispatchReceipt, DispatchRequest, Dispatcher};
use crate::retry::RetryPolicy;
use crate::telemetry;

/// Ack detail for an input with no dialable digits.
pub const INVALID_ADDRESS: &str = "invalid address: no digits after normalization";
/// Ack detail for a repeated address when deduplication is on.
pub const DUPLICATE: &str = "duplicate";

/// A broadcast to create.
#[derive(Debug, Clone, Default)]
pub struct CampaignRequest {
    /// Raw recipient strings, one per intended message.
    pub recipients: Vec<String>,
    pub template_name: String,
    /// Falls back to the configured default language when absent or blank.
    pub language_code: Option<String>,
    /// Provider-specific template parameters.
    pub components: Option<serde_json::Value>,
}

/// What happened to one input recipient at submission time.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipientAck {
    /// The raw input string.
    pub input: String,
    /// Normalized address (empty when nothing survived normalization).
    pub address: String,
    /// Provisional job id, or the reason no job was queued.
    pub result: Result<JobId, String>,
}

/// Returned as soon as the campaign's jobs are queued.
#[derive(Debug, Clone)]
pub struct CampaignReceipt {
    pub campaign_id: CampaignId,
    pub total: u32,
    pub acks: Vec<RecipientAck>,
}

impl CampaignReceipt {
    /// Number of inputs that were queued as jobs.
    pub fn accepted(&self) -> usize {
        self.acks.iter().filter(|a| a.result.is_ok()).count()
    }

    /// Inputs that produced no queued job.
    pub fn rejected(&self) -> impl Iterator<Item = &RecipientAck> {
        self.acks.iter().filter(|a| a.result.is_err())
    }
}

/// Coordinator settings drawn from `[campaign]` and `[retry]`.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub default_language: String,
    pub dedupe_recipients: bool,
    pub retry: RetryPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from(&CourierConfig::default())
    }
}

impl From<&CourierConfig> for CoordinatorConfig {
    fn from(config: &CourierConfig) -> Self {
        Self {
            default_language: config.campaign.default_language.clone(),
            dedupe_recipients: config.campaign.dedupe_recipients,
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

type Settled = (JobId, Result<SendOutcome, CourierError>);

/// Bookkeeping for a campaign with at least one running tracker.
#[derive(Debug, Default)]
struct Tracked {
    trackers: usize,
    cancelled: bool,
}

/// State shared between the coordinator and its tracker tasks.
struct Context {
    ledger: Arc<dyn LedgerAdapter>,
    dispatcher: Arc<Dispatcher>,
    retry: RetryPolicy,
    live: DashMap<CampaignId, Tracked>,
    shutdown: CancellationToken,
}

impl Context {
    fn is_cancelled(&self, id: &CampaignId) -> bool {
        self.live.get(id).is_some_and(|t| t.cancelled)
    }

    fn track(&self, id: &CampaignId) {
        self.live.entry(id.clone()).or_default().trackers += 1;
    }

    /// Drop one tracker of `id`, forgetting the campaign once none remain.
    fn untrack(&self, id: &CampaignId) {
        if let Some(mut tracked) = self.live.get_mut(id) {
            tracked.trackers = tracked.trackers.saturating_sub(1);
        }
        self.live.remove_if(id, |_, t| t.trackers == 0);
    }
}

/// Orchestrates campaign creation, fan-out, and outcome folding.
pub struct CampaignCoordinator {
    ctx: Arc<Context>,
    config: CoordinatorConfig,
    trackers: TaskTracker,
}

impl CampaignCoordinator {
    pub fn new(
        ledger: Arc<dyn LedgerAdapter>,
        dispatcher: Arc<Dispatcher>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            ctx: Arc::new(Context {
                ledger,
                dispatcher,
                retry: config.retry.clone(),
                live: DashMap::new(),
                shutdown: CancellationToken::new(),
            }),
            config,
            trackers: TaskTracker::new(),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.ctx.dispatcher
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerAdapter> {
        &self.ctx.ledger
    }

    /// Create a campaign and queue one job per valid recipient.
    ///
    /// Rejects with [`CourierError::Validation`] before writing anything if
    /// the template name is blank or no recipient survives normalization.
    /// Returns without waiting for any send.
    pub async fn create_campaign(
        &self,
        request: CampaignRequest,
    ) -> Result<CampaignReceipt, CourierError> {
        let template_name = request.template_name.trim().to_string();
        if template_name.is_empty() {
            return Err(CourierError::Validation("template name is required".into()));
        }
        let language_code = request
            .language_code
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| self.config.default_language.clone());

        let mut acks = Vec::with_capacity(request.recipients.len());
        // Index into `acks` for each job, in input order.
        let mut jobs: Vec<(usize, NewJob)> = Vec::new();
        let mut seen = HashSet::new();

        for input in request.recipients {
            let Some(address) = normalize_checked(&input) else {
                acks.push(RecipientAck {
                    input,
                    address: String::new(),
                    result: Err(INVALID_ADDRESS.to_string()),
                });
                continue;
            };
            if self.config.dedupe_recipients && !seen.insert(address.clone()) {
                acks.push(RecipientAck {
                    input,
                    address,
                    result: Err(DUPLICATE.to_string()),
                });
                continue;
            }
            let id = JobId::generate();
            jobs.push((
                acks.len(),
                NewJob {
                    id: id.clone(),
                    address: address.clone(),
                    template_name: template_name.clone(),
                    language_code: language_code.clone(),
                    components: request.components.clone(),
                },
            ));
            acks.push(RecipientAck {
                input,
                address,
                result: Ok(id),
            });
        }

        if jobs.is_empty() {
            return Err(CourierError::Validation(
                "no valid recipients after normalization".into(),
            ));
        }
        let total = u32::try_from(jobs.len())
            .map_err(|_| CourierError::Validation("too many recipients".into()))?;

        let campaign_id = CampaignId::generate();
        self.ctx
            .ledger
            .create_campaign(&NewCampaign {
                id: campaign_id.clone(),
                template_name: template_name.clone(),
                language_code: language_code.clone(),
                components: request.components.clone(),
                total,
            })
            .await?;

        let (positions, new_jobs): (Vec<usize>, Vec<NewJob>) = jobs.into_iter().unzip();
        let stored = match self.ctx.ledger.insert_jobs(&campaign_id, new_jobs).await {
            Ok(stored) => stored,
            Err(e) => {
                let reason = format!("failed to create jobs: {e}");
                error!(%campaign_id, error = %e, "campaign creation failed");
                if let Err(mark_err) = self
                    .ctx
                    .ledger
                    .mark_campaign_failed(&campaign_id, &reason)
                    .await
                {
                    error!(%campaign_id, error = %mark_err, "could not mark campaign failed");
                }
                telemetry::record_campaign_finished("failed");
                return Err(e);
            }
        };

        telemetry::record_campaign_created();
        info!(
            %campaign_id,
            template = %template_name,
            language = %language_code,
            total,
            rejected = acks.len() - stored.len(),
            "campaign created"
        );

        let mut requests = Vec::with_capacity(stored.len());
        for (pos, job) in positions.into_iter().zip(stored) {
            let request = DispatchRequest {
                job_id: job.id.clone(),
                campaign_id: campaign_id.clone(),
                message: job.message(),
            };
            requests.push((pos, request));
        }
        let mut receipts = Vec::with_capacity(requests.len());
        for (pos, request) in requests {
            match self.ctx.dispatcher.submit(request.clone()) {
                Ok(receipt) => receipts.push((request, 0, receipt)),
                Err(e) => {
                    // The job row stays queued and is picked up by recovery.
                    warn!(%campaign_id, job_id = %request.job_id, error = %e, "enqueue failed");
                    acks[pos].result = Err(format!("enqueue failed: {e}"));
                }
            }
        }

        self.spawn_tracker(campaign_id.clone(), receipts);

        Ok(CampaignReceipt {
            campaign_id,
            total,
            acks,
        })
    }

    /// Remove a campaign's not-yet-sent jobs from the dispatcher.
    ///
    /// Removed jobs settle as failed with `campaign cancelled`, so the
    /// campaign still reaches `completed`. Jobs already handed to the
    /// provider finish normally; pending retries are abandoned.
    pub async fn cancel_campaign(&self, id: &CampaignId) -> Result<usize, CourierError> {
        let campaign = self.require_campaign(id).await?;
        if campaign.status.is_terminal() {
            return Ok(0);
        }
        // Only a campaign with a running tracker has anything left to stop.
        if let Some(mut tracked) = self.ctx.live.get_mut(id) {
            tracked.cancelled = true;
        }
        let removed = self.ctx.dispatcher.cancel_campaign(id)?;
        info!(campaign_id = %id, removed, "campaign cancelled");
        Ok(removed)
    }

    /// Re-submit jobs orphaned by a previous process.
    ///
    /// Every non-terminal job not updated for `grace_secs` is queued again,
    /// grouped into one tracker per campaign. Nothing is queued while the
    /// ledger shows activity within `grace_secs`. Returns how many were queued.
    pub async fn recover(&self, grace_secs: u64) -> Result<usize, CourierError> {
        let stale = self.ctx.ledger.stale_jobs(grace_secs).await?;
        if stale.is_empty() {
            debug!("no stale jobs to recover");
            return Ok(0);
        }

        let mut order: Vec<CampaignId> = Vec::new();
        let mut groups: HashMap<CampaignId, Vec<Job>> = HashMap::new();
        for job in stale {
            if !groups.contains_key(&job.campaign_id) {
                order.push(job.campaign_id.clone());
            }
            groups.entry(job.campaign_id.clone()).or_default().push(job);
        }

        let mut resubmitted = 0;
        for campaign_id in order {
            let jobs = groups.remove(&campaign_id).unwrap_or_default();
            let mut receipts = Vec::with_capacity(jobs.len());
            for job in jobs {
                let request = DispatchRequest {
                    job_id: job.id.clone(),
                    campaign_id: campaign_id.clone(),
                    message: job.message(),
                };
                match self.ctx.dispatcher.submit(request.clone()) {
                    Ok(receipt) => receipts.push((request, job.attempts, receipt)),
                    Err(e) => {
                        warn!(%campaign_id, job_id = %job.id, error = %e, "recovery enqueue failed")
                    }
                }
            }
            resubmitted += receipts.len();
            info!(%campaign_id, jobs = receipts.len(), "recovered stale jobs");
            self.spawn_tracker(campaign_id, receipts);
        }
        Ok(resubmitted)
    }

    /// Number of campaigns with a running tracker.
    pub fn live_campaigns(&self) -> usize {
        self.ctx.live.len()
    }

    /// Current ledger state of one campaign.
    pub async fn campaign(&self, id: &CampaignId) -> Result<Option<Campaign>, CourierError> {
        self.ctx.ledger.get_campaign(id).await
    }

    /// Jobs of one campaign in input order, optionally filtered by status.
    pub async fn jobs(
        &self,
        id: &CampaignId,
        status: Option<JobStatus>,
    ) -> Result<Vec<Job>, CourierError> {
        self.ctx.ledger.list_jobs(id, status).await
    }

    /// Campaigns newest first.
    pub async fn campaigns(
        &self,
        status: Option<CampaignStatus>,
        limit: Option<u32>,
    ) -> Result<Vec<Campaign>, CourierError> {
        self.ctx.ledger.list_campaigns(status, limit).await
    }

    /// Poll the ledger until the campaign reaches a terminal state.
    pub async fn wait_for_completion(
        &self,
        id: &CampaignId,
        poll: Duration,
    ) -> Result<Campaign, CourierError> {
        loop {
            let campaign = self.require_campaign(id).await?;
            if campaign.status.is_terminal() {
                return Ok(campaign);
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Stop scheduling retries, stop the dispatcher, and wait for trackers.
    ///
    /// Jobs still queued when the dispatcher stops stay non-terminal in the
    /// ledger for the next process to recover.
    pub async fn shutdown(&self) -> Result<(), CourierError> {
        self.ctx.shutdown.cancel();
        self.trackers.close();
        let dropped = self.ctx.dispatcher.stop().await?;
        self.trackers.wait().await;
        info!(dropped, live = self.live_campaigns(), "coordinator shut down");
        Ok(())
    }

    async fn require_campaign(&self, id: &CampaignId) -> Result<Campaign, CourierError> {
        self.ctx
            .ledger
            .get_campaign(id)
            .await?
            .ok_or_else(|| CourierError::NotFound {
                kind: "campaign",
                id: id.to_string(),
            })
    }

    fn spawn_tracker(
        &self,
        campaign_id: CampaignId,
        receipts: Vec<(DispatchRequest, u32, DispatchReceipt)>,
    ) {
        if receipts.is_empty() {
            return;
        }
        self.ctx.track(&campaign_id);
        let ctx = Arc::clone(&self.ctx);
        self.trackers
            .spawn(track_campaign(ctx, campaign_id, receipts));
    }
}

/// Failure detail worth retrying, if any.
fn retryable(outcome: &SendOutcome) -> Option<&str> {
    match outcome {
        SendOutcome::Failed { error } if error != CANCELLED => Some(error),
        _ => None,
    }
}

/// Fold every outcome of one campaign into the ledger.
async fn track_campaign(
    ctx: Arc<Context>,
    campaign_id: CampaignId,
    receipts: Vec<(DispatchRequest, u32, DispatchReceipt)>,
) {
    let mut requests: HashMap<JobId, DispatchRequest> = HashMap::new();
    let mut attempts: HashMap<JobId, u32> = HashMap::new();
    let mut inflight: FuturesUnordered<BoxFuture<'static, Settled>> = FuturesUnordered::new();

    for (request, prior_attempts, receipt) in receipts {
        let job_id = request.job_id.clone();
        attempts.insert(job_id.clone(), prior_attempts);
        requests.insert(job_id.clone(), request);
        inflight.push(async move { (job_id, receipt.await) }.boxed());
    }

    while let Some((job_id, result)) = inflight.next().await {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(%campaign_id, %job_id, error = %e, "job left unsettled for recovery");
                continue;
            }
        };

        let attempt = attempts.get(&job_id).copied().unwrap_or(0) + 1;
        attempts.insert(job_id.clone(), attempt);

        if let Some(error) = retryable(&outcome) {
            let cancelled = ctx.is_cancelled(&campaign_id);
            if !cancelled && !ctx.shutdown.is_cancelled() && ctx.retry.should_retry(attempt) {
                if let Some(request) = requests.get(&job_id).cloned() {
                    if let Err(e) = ctx.ledger.record_retry(&job_id, error).await {
                        error!(%campaign_id, %job_id, error = %e, "failed to record retry");
                    }
                    let delay = ctx.retry.backoff(attempt);
                    warn!(
                        %campaign_id,
                        %job_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error,
                        "send failed, retrying"
                    );
                    telemetry::record_retry();
                    inflight.push(retry_after(Arc::clone(&ctx), request, delay).boxed());
                    continue;
                }
            }
            warn!(%campaign_id, %job_id, attempt, error, "send failed");
        }

        match ctx.ledger.record_outcome(&job_id, &outcome).await {
            Ok(Some(campaign)) if campaign.status == CampaignStatus::Completed => {
                info!(
                    %campaign_id,
                    success = campaign.success,
                    failed = campaign.failed,
                    total = campaign.total,
                    "campaign completed"
                );
                telemetry::record_campaign_finished("completed");
            }
            Ok(Some(_)) => {}
            Ok(None) => debug!(%campaign_id, %job_id, "outcome for settled job ignored"),
            Err(e) => error!(%campaign_id, %job_id, error = %e, "failed to record outcome"),
        }
    }

    ctx.untrack(&campaign_id);
    debug!(%campaign_id, "campaign tracker finished");
}

/// Wait out the backoff, then submit the job again.
async fn retry_after(ctx: Arc<Context>, request: DispatchRequest, delay: Duration) -> Settled {
    let job_id = request.job_id.clone();
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = ctx.shutdown.cancelled() => {
            return (job_id, Err(CourierError::Dispatch("shutting down".into())));
        }
    }
    if ctx.shutdown.is_cancelled() {
        return (job_id, Err(CourierError::Dispatch("shutting down".into())));
    }
    if ctx.is_cancelled(&request.campaign_id) {
        return (job_id, Ok(SendOutcome::failure(CANCELLED)));
    }
    match ctx.dispatcher.submit(request) {
        Ok(receipt) => (job_id, receipt.await),
        Err(e) => (job_id, Err(e)),
    }
}
