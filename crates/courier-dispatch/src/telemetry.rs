// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric hooks for the dispatch path.
//!
//! Backed by `courier-prometheus` when the `prometheus` feature is on and
//! compiled to no-ops otherwise.

#[cfg(feature = "prometheus")]
pub(crate) use courier_prometheus::{
    record_campaign_created, record_campaign_finished, record_dispatch, record_drain_batch,
    record_provider_latency, record_retry, set_queue_depth,
};

#[cfg(not(feature = "prometheus"))]
pub(crate) use noop::*;

#[cfg(not(feature = "prometheus"))]
mod noop {
    pub(crate) fn record_dispatch(_outcome: &'static str) {}
    pub(crate) fn set_queue_depth(_depth: usize) {}
    pub(crate) fn record_drain_batch(_size: usize) {}
    pub(crate) fn record_provider_latency(_seconds: f64) {}
    pub(crate) fn record_campaign_created() {}
    pub(crate) fn record_campaign_finished(_status: &str) {}
    pub(crate) fn record_retry() {}
}
