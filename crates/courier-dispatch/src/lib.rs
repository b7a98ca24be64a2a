// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch engine for the Courier broadcast engine.
//!
//! The [`Dispatcher`] holds one process-wide FIFO queue and releases at most
//! `per_window` provider calls per window. The [`CampaignCoordinator`] sits
//! in front of it: it turns a campaign request into ledger rows and
//! dispatcher submissions, and folds outcomes back into the ledger.

pub mod coordinator;
pub mod dispatcher;
pub mod retry;
mod telemetry;

pub use coordinator::{
    CampaignCoordinator, CampaignReceipt, CampaignRequest, CoordinatorConfig, RecipientAck,
};
pub use dispatcher::{CANCELLED, DispatchReceipt, DispatchRequest, Dispatcher};
pub use retry::RetryPolicy;
