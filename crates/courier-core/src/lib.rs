// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier broadcast engine.
//!
//! This crate provides the foundational trait definitions, error types,
//! ledger records, and recipient normalization used throughout the Courier
//! workspace. Provider and ledger backends implement traits defined here.

pub mod error;
pub mod recipient;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CourierError;
pub use types::{
    AdapterType, Campaign, CampaignId, CampaignStatus, HealthStatus, Job, JobId, JobStatus,
    NewCampaign, NewJob, ProviderMessageId, SendOutcome, TemplateMessage,
};

pub use traits::{LedgerAdapter, PluginAdapter, ProviderAdapter};
