// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the Cloud API `/messages` endpoint.

use serde::{Deserialize, Serialize};

use courier_core::TemplateMessage;

#[derive(Debug, Clone, Serialize)]
pub struct SendTemplateRequest<'a> {
    pub messaging_product: &'static str,
    pub to: &'a str,
    #[serde(rename = "type")]
    pub type_: &'static str,
    pub template: Template<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Template<'a> {
    pub name: &'a str,
    pub language: Language<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<&'a serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Language<'a> {
    pub code: &'a str,
}

impl<'a> From<&'a TemplateMessage> for SendTemplateRequest<'a> {
    fn from(message: &'a TemplateMessage) -> Self {
        Self {
            messaging_product: "whatsapp",
            to: &message.address,
            type_: "template",
            template: Template {
                name: &message.template_name,
                language: Language {
                    code: &message.language_code,
                },
                components: message.components.as_ref(),
            },
        }
    }
}

/// Successful send response.
#[derive(Debug, Clone, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub messages: Vec<SentMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub id: String,
}

/// Error envelope returned on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub message: String,
    #[serde(default)]
    pub code: Option<i64>,
}
