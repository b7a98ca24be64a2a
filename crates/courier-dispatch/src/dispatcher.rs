// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rate-limited dispatcher.
//!
//! A single FIFO queue is drained once per window. Each drain takes at most
//! `per_window` entries from the head and issues their provider calls
//! concurrently, one task per entry. Unused capacity is never carried over:
//! an empty drain is a no-op, so a burst after an idle period is still
//! capped at `per_window`.
//!
//! Ticks come from a `tokio::time::interval` with
//! [`MissedTickBehavior::Delay`], so two drains are never closer together
//! than one window even if the runtime stalls.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use courier_config::model::DispatchConfig;
use courier_core::{CampaignId, CourierError, JobId, ProviderAdapter, SendOutcome, TemplateMessage};

use crate::telemetry;

/// Failure detail attached to entries removed by [`Dispatcher::cancel_campaign`].
pub const CANCELLED: &str = "campaign cancelled";

/// One job handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub job_id: JobId,
    pub campaign_id: CampaignId,
    pub message: TemplateMessage,
}

/// Resolves with the outcome of one submitted job.
///
/// Provider failures resolve as `Ok(SendOutcome::Failed { .. })`. The only
/// error is the dispatcher dropping the entry unsent (see [`Dispatcher::stop`]).
#[derive(Debug)]
pub struct DispatchReceipt {
    pub job_id: JobId,
    pub campaign_id: CampaignId,
    rx: oneshot::Receiver<SendOutcome>,
}

impl Future for DispatchReceipt {
    type Output = Result<SendOutcome, CourierError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|res| {
            res.map_err(|_| {
                CourierError::Dispatch("dispatcher stopped before the job was sent".into())
            })
        })
    }
}

struct Entry {
    request: DispatchRequest,
    tx: oneshot::Sender<SendOutcome>,
}

struct Shared {
    queue: Mutex<VecDeque<Entry>>,
    provider: Arc<dyn ProviderAdapter>,
    per_window: usize,
}

impl Shared {
    /// Lock the queue, taking it over from a holder that panicked.
    fn queue(&self) -> MutexGuard<'_, VecDeque<Entry>> {
        self.queue.lock().unwrap_or_else(|poisoned| {
            warn!("dispatch queue lock was poisoned, recovering");
            self.queue.clear_poison();
            PoisonError::into_inner(poisoned)
        })
    }

    /// Release up to `per_window` entries. Returns how many were launched.
    fn drain(&self, batch: u64) -> usize {
        let (entries, remaining) = {
            let mut queue = self.queue();
            let take = queue.len().min(self.per_window);
            let entries: Vec<Entry> = queue.drain(..take).collect();
            (entries, queue.len())
        };
        telemetry::set_queue_depth(remaining);

        if entries.is_empty() {
            return 0;
        }

        let size = entries.len();
        debug!(batch, size, remaining, "draining dispatch queue");
        telemetry::record_drain_batch(size);

        for entry in entries {
            tokio::spawn(send_one(Arc::clone(&self.provider), entry));
        }
        size
    }
}

/// Issue one provider call and resolve its receipt.
///
/// Transport errors and panics inside the provider become failure outcomes.
async fn send_one(provider: Arc<dyn ProviderAdapter>, entry: Entry) {
    let Entry { request, tx } = entry;
    let started = Instant::now();

    let outcome = match AssertUnwindSafe(provider.send(&request.message))
        .catch_unwind()
        .await
    {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            warn!(
                job_id = %request.job_id,
                campaign_id = %request.campaign_id,
                error = %e,
                "provider transport error"
            );
            SendOutcome::failure(e.to_string())
        }
        Err(panic) => {
            let detail = panic_message(panic.as_ref());
            error!(
                job_id = %request.job_id,
                campaign_id = %request.campaign_id,
                panic = %detail,
                "provider call panicked"
            );
            SendOutcome::failure(format!("provider panicked: {detail}"))
        }
    };

    telemetry::record_provider_latency(started.elapsed().as_secs_f64());
    telemetry::record_dispatch(outcome.label());

    if tx.send(outcome).is_err() {
        debug!(job_id = %request.job_id, "receipt dropped before outcome arrived");
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct DrainTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Process-wide rate limiter in front of the provider.
///
/// Construct one per process and share it; every campaign submits into the
/// same queue, so all campaigns share one throughput ceiling.
pub struct Dispatcher {
    shared: Arc<Shared>,
    window: Duration,
    drain: Mutex<Option<DrainTask>>,
}

impl Dispatcher {
    fn drain_state(&self) -> MutexGuard<'_, Option<DrainTask>> {
        self.drain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn new(config: &DispatchConfig, provider: Arc<dyn ProviderAdapter>) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                provider,
                per_window: config.per_window.max(1),
            }),
            window: config.window().max(Duration::from_millis(1)),
            drain: Mutex::new(None),
        }
    }

    /// Spawn the drain loop if it is not already running.
    ///
    /// Must be called from within a Tokio runtime. The first drain happens
    /// immediately.
    pub fn start(&self) -> Result<(), CourierError> {
        let mut drain = self.drain_state();
        if drain.is_some() {
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(drain_loop(
            Arc::clone(&self.shared),
            self.window,
            cancel.clone(),
        ));
        *drain = Some(DrainTask { cancel, handle });
        info!(
            per_window = self.shared.per_window,
            window_ms = self.window.as_millis() as u64,
            "dispatcher started"
        );
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.drain_state().is_some()
    }

    /// Stop the drain loop and drop everything still queued.
    ///
    /// Receipts of dropped entries resolve to [`CourierError::Dispatch`].
    /// Calls already issued to the provider run to completion. A later
    /// `submit` starts a fresh drain loop.
    pub async fn stop(&self) -> Result<usize, CourierError> {
        let task = self.drain_state().take();

        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                error!(error = %e, "drain task ended abnormally");
            }
        }

        let dropped = {
            let mut queue = self.shared.queue();
            let dropped = queue.len();
            queue.clear();
            dropped
        };
        telemetry::set_queue_depth(0);
        info!(dropped, "dispatcher stopped");
        Ok(dropped)
    }

    /// Enqueue one job. Returns once the job is queued, not once it is sent.
    ///
    /// Starts the drain loop on first use.
    pub fn submit(&self, request: DispatchRequest) -> Result<DispatchReceipt, CourierError> {
        let (tx, rx) = oneshot::channel();
        let receipt = DispatchReceipt {
            job_id: request.job_id.clone(),
            campaign_id: request.campaign_id.clone(),
            rx,
        };
        let depth = {
            let mut queue = self.shared.queue();
            queue.push_back(Entry { request, tx });
            queue.len()
        };
        telemetry::set_queue_depth(depth);
        self.start()?;
        Ok(receipt)
    }

    /// Number of entries waiting for a drain.
    pub fn pending(&self) -> usize {
        self.shared.queue().len()
    }

    /// Remove every not-yet-drained entry of `campaign_id`.
    ///
    /// Removed receipts resolve to `Failed { error: "campaign cancelled" }`.
    /// Entries already handed to the provider are unaffected.
    pub fn cancel_campaign(&self, campaign_id: &CampaignId) -> Result<usize, CourierError> {
        let removed: Vec<Entry> = {
            let mut queue = self.shared.queue();
            let (removed, kept): (VecDeque<Entry>, VecDeque<Entry>) = queue
                .drain(..)
                .partition(|entry| &entry.request.campaign_id == campaign_id);
            *queue = kept;
            telemetry::set_queue_depth(queue.len());
            removed.into_iter().collect()
        };

        let count = removed.len();
        for entry in removed {
            let _ = entry.tx.send(SendOutcome::failure(CANCELLED));
        }
        info!(%campaign_id, removed = count, "campaign entries cancelled");
        Ok(count)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let drain = self.drain.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = drain.take() {
            task.cancel.cancel();
        }
    }
}

async fn drain_loop(shared: Arc<Shared>, window: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(window);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut batch: u64 = 0;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("drain loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                batch += 1;
                // A failing iteration is logged and the next tick still runs.
                if let Err(panic) =
                    std::panic::catch_unwind(AssertUnwindSafe(|| shared.drain(batch)))
                {
                    error!(
                        batch,
                        panic = %panic_message(panic.as_ref()),
                        "drain panicked"
                    );
                }
            }
        }
    }
}
