// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier status`, `courier jobs` and `courier campaigns`.
//!
//! Read-only projections of the ledger. `--json` prints the records as
//! JSON for scripting; otherwise a short human summary is printed, colored
//! when stdout is a terminal.

use std::io::IsTerminal;

use courier_config::model::CourierConfig;
use courier_core::{
    Campaign, CampaignId, CampaignStatus, CourierError, Job, JobStatus, LedgerAdapter,
};

use crate::engine::open_ledger;

/// Run `courier status <campaign-id>`.
pub async fn run_status(
    config: &CourierConfig,
    campaign_id: String,
    json: bool,
) -> Result<(), CourierError> {
    let ledger = open_ledger(config).await?;
    let id = CampaignId(campaign_id);
    let campaign = ledger.get_campaign(&id).await;
    ledger.close().await?;

    let campaign = campaign?.ok_or_else(|| not_found(&id))?;
    print_campaign(&campaign, json, use_color());
    Ok(())
}

/// Run `courier jobs <campaign-id> [--status S]`.
pub async fn run_jobs(
    config: &CourierConfig,
    campaign_id: String,
    status: Option<JobStatus>,
    json: bool,
) -> Result<(), CourierError> {
    let ledger = open_ledger(config).await?;
    let id = CampaignId(campaign_id);
    let jobs = fetch_jobs(&ledger, &id, status).await;
    ledger.close().await?;

    let jobs = jobs?;
    if json {
        println!("{}", to_json(&jobs));
    } else {
        let color = use_color();
        for job in &jobs {
            println!("{}", job_line(job, color));
        }
        if jobs.is_empty() {
            println!("no jobs");
        }
    }
    Ok(())
}

/// Run `courier campaigns [--status S] [--limit N]`.
pub async fn run_campaigns(
    config: &CourierConfig,
    status: Option<CampaignStatus>,
    limit: Option<u32>,
    json: bool,
) -> Result<(), CourierError> {
    let ledger = open_ledger(config).await?;
    let campaigns = ledger.list_campaigns(status, limit).await;
    ledger.close().await?;

    let campaigns = campaigns?;
    if json {
        println!("{}", to_json(&campaigns));
    } else {
        let color = use_color();
        for campaign in &campaigns {
            println!("{}", campaign_line(campaign, color));
        }
        if campaigns.is_empty() {
            println!("no campaigns");
        }
    }
    Ok(())
}

async fn fetch_jobs(
    ledger: &dyn LedgerAdapter,
    id: &CampaignId,
    status: Option<JobStatus>,
) -> Result<Vec<Job>, CourierError> {
    if ledger.get_campaign(id).await?.is_none() {
        return Err(not_found(id));
    }
    ledger.list_jobs(id, status).await
}

fn not_found(id: &CampaignId) -> CourierError {
    CourierError::NotFound {
        kind: "campaign",
        id: id.to_string(),
    }
}

fn use_color() -> bool {
    std::io::stdout().is_terminal()
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

/// Print one campaign, as JSON or as a summary block.
pub fn print_campaign(campaign: &Campaign, json: bool, use_color: bool) {
    if json {
        println!("{}", to_json(campaign));
        return;
    }

    println!();
    println!("  campaign {}", campaign.id);
    println!("  {}", "-".repeat(44));
    println!(
        "    Status:    {}",
        paint(&campaign.status.to_string(), campaign_tone(campaign.status), use_color)
    );
    println!(
        "    Template:  {} ({})",
        campaign.template_name, campaign.language_code
    );
    println!(
        "    Progress:  {}/{} settled, {} queued",
        campaign.settled(),
        campaign.total,
        campaign.queued
    );
    println!(
        "    Outcomes:  {} sent, {} failed",
        paint(&campaign.success.to_string(), Tone::Good, use_color),
        paint(&campaign.failed.to_string(), Tone::Bad, use_color)
    );
    println!("    Created:   {}", campaign.created_at);
    if let Some(started) = &campaign.started_at {
        println!("    Started:   {started}");
    }
    if let Some(finished) = &campaign.finished_at {
        println!("    Finished:  {finished}");
    }
    if let Some(error) = &campaign.error {
        println!("    Error:     {}", paint(error, Tone::Bad, use_color));
    }
    println!();
}

fn campaign_line(campaign: &Campaign, use_color: bool) -> String {
    format!(
        "{}  {:<10}  {:>6}/{:<6} ok={} failed={}  {}  {}",
        campaign.id,
        paint(&campaign.status.to_string(), campaign_tone(campaign.status), use_color),
        campaign.settled(),
        campaign.total,
        campaign.success,
        campaign.failed,
        campaign.template_name,
        campaign.created_at
    )
}

fn job_line(job: &Job, use_color: bool) -> String {
    let detail = match job.status {
        JobStatus::Success => job
            .provider_message_id
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        _ => job.last_error.clone().unwrap_or_default(),
    };
    format!(
        "{}  {:<16}  {:<10}  attempts={}  {}",
        job.id,
        job.address,
        paint(&job.status.to_string(), job_tone(job.status), use_color),
        job.attempts,
        detail
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Good,
    Bad,
    Pending,
    Plain,
}

fn campaign_tone(status: CampaignStatus) -> Tone {
    match status {
        CampaignStatus::Completed => Tone::Good,
        CampaignStatus::Failed => Tone::Bad,
        CampaignStatus::Processing => Tone::Pending,
        CampaignStatus::Queued => Tone::Plain,
    }
}

fn job_tone(status: JobStatus) -> Tone {
    match status {
        JobStatus::Success => Tone::Good,
        JobStatus::Failed => Tone::Bad,
        JobStatus::Processing => Tone::Pending,
        JobStatus::Queued => Tone::Plain,
    }
}

fn paint(text: &str, tone: Tone, use_color: bool) -> String {
    if !use_color {
        return text.to_string();
    }
    use colored::Colorize;
    match tone {
        Tone::Good => text.green().to_string(),
        Tone::Bad => text.red().to_string(),
        Tone::Pending => text.yellow().to_string(),
        Tone::Plain => text.to_string(),
    }
}
