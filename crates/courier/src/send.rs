// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier send` command implementation.
//!
//! Creates one campaign from a recipients file and follows it to completion.
//! Interrupting leaves unsent jobs queued for `courier serve` to recover.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use courier_config::model::CourierConfig;
use courier_core::{Campaign, CourierError, HealthStatus};
use courier_dispatch::{CampaignCoordinator, CampaignReceipt, CampaignRequest};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use crate::engine::Engine;
use crate::shutdown;
use crate::status::print_campaign;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Arguments of `courier send`.
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Name of the approved message template.
    #[arg(long)]
    pub template: String,

    /// Template language code (defaults to `campaign.default_language`).
    #[arg(long)]
    pub language: Option<String>,

    /// Template components as a JSON array.
    #[arg(long, value_name = "JSON")]
    pub components: Option<String>,

    /// Emit the final campaign as JSON instead of a summary.
    #[arg(long)]
    pub json: bool,

    /// File with one recipient per line, or `-` for stdin.
    pub recipients: PathBuf,
}

/// Non-blank lines of `content`, trimmed.
pub fn read_recipients(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `--components`; it must be a JSON array when given.
pub fn parse_components(raw: Option<&str>) -> Result<Option<serde_json::Value>, CourierError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| CourierError::Validation(format!("--components is not valid JSON: {e}")))?;
    if !value.is_array() {
        return Err(CourierError::Validation(
            "--components must be a JSON array".into(),
        ));
    }
    Ok(Some(value))
}

fn load_recipients(path: &Path) -> Result<Vec<String>, CourierError> {
    let content = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin())
    } else {
        std::fs::read_to_string(path)
    }
    .map_err(|e| {
        CourierError::Validation(format!(
            "cannot read recipients from {}: {e}",
            path.display()
        ))
    })?;
    Ok(read_recipients(&content))
}

/// Refuses to send through a provider that reported itself unusable.
fn require_provider(health: &HealthStatus) -> Result<(), CourierError> {
    match health {
        HealthStatus::Healthy => Ok(()),
        HealthStatus::Unhealthy(reason) => Err(CourierError::HealthCheckFailed {
            name: "whatsapp".into(),
            source: format!("{reason}: set whatsapp.access_token and whatsapp.phone_number_id")
                .into(),
        }),
    }
}

/// Runs the `courier send` command.
pub async fn run_send(config: CourierConfig, args: SendArgs) -> Result<(), CourierError> {
    let recipients = load_recipients(&args.recipients)?;
    let components = parse_components(args.components.as_deref())?;

    let engine = Engine::open(&config).await?;
    if let Err(e) = require_provider(&engine.provider_health) {
        engine.close().await?;
        return Err(e);
    }

    let request = CampaignRequest {
        recipients,
        template_name: args.template,
        language_code: args.language,
        components,
    };
    let result = send_and_follow(&engine.coordinator, request, args.json).await;
    engine.close().await?;

    match result? {
        Some(campaign) => print_campaign(&campaign, args.json, use_color()),
        None => eprintln!("interrupted: unsent jobs stay queued for `courier serve` to recover"),
    }
    Ok(())
}

async fn send_and_follow(
    coordinator: &CampaignCoordinator,
    request: CampaignRequest,
    json: bool,
) -> Result<Option<Campaign>, CourierError> {
    let receipt = coordinator.create_campaign(request).await?;
    report_rejected(&receipt);

    let cancel = shutdown::install_signal_handler();
    tokio::select! {
        campaign = follow_progress(coordinator, &receipt, json) => campaign.map(Some),
        _ = cancel.cancelled() => Ok(None),
    }
}

fn report_rejected(receipt: &CampaignReceipt) {
    for ack in receipt.rejected() {
        if let Err(reason) = &ack.result {
            warn!(input = %ack.input, %reason, "recipient skipped");
        }
    }
}

async fn follow_progress(
    coordinator: &CampaignCoordinator,
    receipt: &CampaignReceipt,
    json: bool,
) -> Result<Campaign, CourierError> {
    let bar = if json || !std::io::stderr().is_terminal() {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(u64::from(receipt.total))
    };
    let style = ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")
        .map(|s| s.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);

    loop {
        let campaign = coordinator
            .campaign(&receipt.campaign_id)
            .await?
            .ok_or_else(|| CourierError::NotFound {
                kind: "campaign",
                id: receipt.campaign_id.to_string(),
            })?;
        bar.set_position(u64::from(campaign.settled()));
        bar.set_message(format!("{} sent, {} failed", campaign.success, campaign.failed));
        if campaign.status.is_terminal() {
            bar.finish_and_clear();
            return Ok(campaign);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn use_color() -> bool {
    std::io::stdout().is_terminal()
}
