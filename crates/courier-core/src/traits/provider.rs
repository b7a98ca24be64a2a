// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for outbound messaging services (WhatsApp Cloud API, etc.).

use async_trait::async_trait;

use crate::error::CourierError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{SendOutcome, TemplateMessage};

/// Adapter for the third-party service that actually delivers messages.
///
/// Implementations perform exactly one outbound call per `send` and never
/// retry internally. A rejection reported by the provider is returned as
/// `Ok(SendOutcome::Failed { .. })`; `Err` is reserved for transport-level
/// failures where no answer was obtained.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends one template message and reports the provider's verdict.
    async fn send(&self, message: &TemplateMessage) -> Result<SendOutcome, CourierError>;
}
