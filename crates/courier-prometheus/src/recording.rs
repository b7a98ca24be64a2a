// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics. Without an installed recorder every helper
//! is a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Courier metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "courier_dispatch_total",
        "Provider calls completed by the dispatcher, by outcome"
    );
    describe_gauge!(
        "courier_queue_depth",
        "Dispatch requests waiting for a drain"
    );
    describe_histogram!(
        "courier_drain_batch_size",
        "Requests released per drain window"
    );
    describe_histogram!(
        "courier_provider_latency_seconds",
        "Provider send latency in seconds"
    );
    describe_counter!("courier_campaigns_created_total", "Campaigns accepted");
    describe_counter!(
        "courier_campaigns_finished_total",
        "Campaigns that reached a terminal state, by status"
    );
    describe_counter!("courier_retries_total", "Job attempts scheduled for retry");
}

/// Record one completed provider call.
pub fn record_dispatch(outcome: &'static str) {
    metrics::counter!("courier_dispatch_total", "outcome" => outcome).increment(1);
}

/// Set the current dispatch queue depth.
pub fn set_queue_depth(depth: usize) {
    metrics::gauge!("courier_queue_depth").set(depth as f64);
}

/// Record the size of one non-empty drain.
pub fn record_drain_batch(size: usize) {
    metrics::histogram!("courier_drain_batch_size").record(size as f64);
}

/// Record provider send latency.
pub fn record_provider_latency(seconds: f64) {
    metrics::histogram!("courier_provider_latency_seconds").record(seconds);
}

pub fn record_campaign_created() {
    metrics::counter!("courier_campaigns_created_total").increment(1);
}

/// Record a campaign reaching `completed` or `failed`.
pub fn record_campaign_finished(status: &str) {
    metrics::counter!("courier_campaigns_finished_total", "status" => status.to_string())
        .increment(1);
}

pub fn record_retry() {
    metrics::counter!("courier_retries_total").increment(1);
}
