// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API provider adapter.
//!
//! Sends one template message per call to
//! `POST {base_url}/{api_version}/{phone_number_id}/messages`. API-level
//! rejections come back as [`SendOutcome::Failed`]; only transport failures
//! are errors. No retries happen here.

pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use courier_config::model::WhatsAppConfig;
use courier_core::types::{AdapterType, HealthStatus};
use courier_core::{CourierError, PluginAdapter, ProviderAdapter, SendOutcome, TemplateMessage};

use crate::types::{ApiErrorResponse, SendResponse, SendTemplateRequest};

#[derive(Debug, Clone)]
struct Credentials {
    endpoint: String,
}

/// Provider adapter for the WhatsApp Cloud API.
#[derive(Debug, Clone)]
pub struct WhatsAppProvider {
    client: reqwest::Client,
    credentials: Option<Credentials>,
}

impl WhatsAppProvider {
    /// Build the HTTP client from `[whatsapp]`.
    ///
    /// Missing credentials are not an error here: the adapter reports
    /// `Unhealthy` and every send fails until they are configured.
    pub fn new(config: &WhatsAppConfig) -> Result<Self, CourierError> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let credentials = match (&config.access_token, &config.phone_number_id) {
            (Some(token), Some(phone_number_id)) => {
                let mut auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                    CourierError::Config(format!("invalid whatsapp access token: {e}"))
                })?;
                auth.set_sensitive(true);
                headers.insert(reqwest::header::AUTHORIZATION, auth);
                Some(Credentials {
                    endpoint: format!(
                        "{}/{}/{}/messages",
                        config.base_url.trim_end_matches('/'),
                        config.api_version,
                        phone_number_id
                    ),
                })
            }
            _ => None,
        };

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CourierError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            credentials,
        })
    }

    fn endpoint(&self) -> Result<&str, CourierError> {
        self.credentials
            .as_ref()
            .map(|c| c.endpoint.as_str())
            .ok_or_else(|| CourierError::Provider {
                message: "whatsapp access_token and phone_number_id are not configured".into(),
                source: None,
            })
    }
}

#[async_trait]
impl PluginAdapter for WhatsAppProvider {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(match self.credentials {
            Some(_) => HealthStatus::Healthy,
            None => HealthStatus::Unhealthy("whatsapp credentials missing".into()),
        })
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for WhatsAppProvider {
    async fn send(&self, message: &TemplateMessage) -> Result<SendOutcome, CourierError> {
        let endpoint = self.endpoint()?;
        let response = self
            .client
            .post(endpoint)
            .json(&SendTemplateRequest::from(message))
            .send()
            .await
            .map_err(|e| CourierError::Provider {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| CourierError::Provider {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;
        debug!(status = %status, to = %message.address, "send response received");

        if status.is_success() {
            let parsed = serde_json::from_str::<SendResponse>(&body).ok();
            return Ok(match parsed.and_then(|r| r.messages.into_iter().next()) {
                Some(sent) => SendOutcome::Delivered {
                    provider_message_id: sent.id.into(),
                },
                None => SendOutcome::failure(format!("response missing message id: {body}")),
            });
        }

        let error = match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(api_err) => api_err.error.message,
            Err(_) => format!("API returned {status}: {body}"),
        };
        Ok(SendOutcome::Failed { error })
    }
}
