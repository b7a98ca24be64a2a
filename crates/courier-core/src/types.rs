// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Courier engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a broadcast campaign.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CampaignId(pub String);

impl CampaignId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a per-recipient job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message identifier assigned by the provider on accepted sends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderMessageId(pub String);

impl ProviderMessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ProviderMessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ProviderMessageId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Ledger,
}

/// Campaign lifecycle: `queued -> processing -> {completed | failed}`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl CampaignStatus {
    /// Terminal states are final.
    pub fn is_terminal(self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Failed)
    }
}

/// Job lifecycle. `processing` marks a job that was attempted and is
/// waiting on a scheduled retry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Success,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }
}

/// One broadcast run, as stored in the campaign ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub template_name: String,
    pub language_code: String,
    /// Provider-specific template parameters, as a JSON array.
    pub components: Option<serde_json::Value>,
    /// Fixed at creation.
    pub total: u32,
    pub queued: u32,
    pub success: u32,
    pub failed: u32,
    pub status: CampaignStatus,
    /// Reason the campaign could not be created, when `status == failed`.
    pub error: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

impl Campaign {
    /// Number of jobs that reached a terminal state.
    pub fn settled(&self) -> u32 {
        self.success + self.failed
    }

    /// True once every job has settled.
    pub fn is_settled(&self) -> bool {
        self.settled() == self.total
    }
}

/// One per-recipient send attempt, as stored in the job ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub campaign_id: CampaignId,
    /// Normalized recipient address.
    pub address: String,
    pub template_name: String,
    pub language_code: String,
    pub components: Option<serde_json::Value>,
    pub status: JobStatus,
    pub attempts: u32,
    pub provider_message_id: Option<ProviderMessageId>,
    pub last_error: Option<String>,
    pub sent_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Job {
    /// Builds the provider payload for this job.
    pub fn message(&self) -> TemplateMessage {
        TemplateMessage {
            address: self.address.clone(),
            template_name: self.template_name.clone(),
            language_code: self.language_code.clone(),
            components: self.components.clone(),
        }
    }
}

/// Input for creating a campaign row.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub id: CampaignId,
    pub template_name: String,
    pub language_code: String,
    pub components: Option<serde_json::Value>,
    pub total: u32,
}

/// Input for creating a job row.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: JobId,
    pub address: String,
    pub template_name: String,
    pub language_code: String,
    pub components: Option<serde_json::Value>,
}

/// A template message ready to hand to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMessage {
    pub address: String,
    pub template_name: String,
    pub language_code: String,
    pub components: Option<serde_json::Value>,
}

/// Result of one provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SendOutcome {
    /// The provider accepted the message.
    Delivered {
        provider_message_id: ProviderMessageId,
    },
    /// The provider rejected the message or could not be reached.
    Failed { error: String },
}

impl SendOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        SendOutcome::Failed {
            error: error.into(),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered { .. })
    }

    /// Label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SendOutcome::Delivered { .. } => "success",
            SendOutcome::Failed { .. } => "failed",
        }
    }
}

/// Current UTC time in the ledger's ISO 8601 millisecond format.
pub fn timestamp_now() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}
