// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job ledger operations.
//!
//! Settling a job and folding it into its campaign's counters happen in
//! one transaction on the single writer connection, so concurrent
//! completions for the same campaign never lose an update.

use courier_core::types::timestamp_now;
use courier_core::{
    Campaign, CampaignId, CourierError, Job, JobId, JobStatus, NewJob, ProviderMessageId,
    SendOutcome,
};
use rusqlite::{OptionalExtension, Row, params};

use super::campaigns;
use super::{NOW, json_column, json_text, parse_column};
use crate::database::{Database, map_tr_err};

const JOB_COLUMNS: &str = "id, campaign_id, address, template_name, language_code, components,
     status, attempts, provider_message_id, last_error, sent_at, created_at, updated_at";

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: JobId(row.get(0)?),
        campaign_id: CampaignId(row.get(1)?),
        address: row.get(2)?,
        template_name: row.get(3)?,
        language_code: row.get(4)?,
        components: json_column(5, row.get(5)?)?,
        status: parse_column(6, row.get(6)?)?,
        attempts: row.get(7)?,
        provider_message_id: row.get::<_, Option<String>>(8)?.map(ProviderMessageId),
        last_error: row.get(9)?,
        sent_at: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// Campaign of a job that can still change state, if any.
fn open_job_campaign(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT campaign_id FROM jobs WHERE id = ?1 AND status IN ('queued', 'processing')",
        params![id],
        |row| row.get(0),
    )
    .optional()
}

/// Insert all jobs of a campaign in one transaction, preserving input order.
pub async fn insert_jobs(
    db: &Database,
    campaign_id: &CampaignId,
    jobs: Vec<NewJob>,
) -> Result<Vec<Job>, CourierError> {
    let now = timestamp_now();
    let rows: Vec<Job> = jobs
        .into_iter()
        .map(|job| Job {
            id: job.id,
            campaign_id: campaign_id.clone(),
            address: job.address,
            template_name: job.template_name,
            language_code: job.language_code,
            components: job.components,
            status: JobStatus::Queued,
            attempts: 0,
            provider_message_id: None,
            last_error: None,
            sent_at: None,
            created_at: now.clone(),
            updated_at: now.clone(),
        })
        .collect();

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO jobs (id, campaign_id, seq, address, template_name,
                     language_code, components, status, attempts, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10)",
                )?;
                for (seq, job) in rows.iter().enumerate() {
                    stmt.execute(params![
                        job.id.0,
                        job.campaign_id.0,
                        seq as i64,
                        job.address,
                        job.template_name,
                        job.language_code,
                        json_text(job.components.as_ref()),
                        job.status.to_string(),
                        job.created_at,
                        job.updated_at,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Get a job by ID.
pub async fn get_job(db: &Database, id: &JobId) -> Result<Option<Job>, CourierError> {
    let key = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                params![key],
                job_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// List a campaign's jobs in creation order.
pub async fn list_jobs(
    db: &Database,
    campaign_id: &CampaignId,
    status: Option<JobStatus>,
) -> Result<Vec<Job>, CourierError> {
    let key = campaign_id.0.clone();
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM jobs
                 WHERE campaign_id = ?1 AND (?2 IS NULL OR status = ?2)
                 ORDER BY seq ASC"
            ))?;
            let rows = stmt.query_map(params![key, status], job_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Settle a job and apply it to the campaign counters atomically.
///
/// Returns `None` without writing anything when the job is unknown or
/// already terminal.
pub async fn record_outcome(
    db: &Database,
    id: &JobId,
    outcome: &SendOutcome,
) -> Result<Option<Campaign>, CourierError> {
    let key = id.0.clone();
    let outcome = outcome.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(campaign_id) = open_job_campaign(&tx, &key)? else {
                return Ok(None);
            };

            match &outcome {
                SendOutcome::Delivered {
                    provider_message_id,
                } => {
                    tx.execute(
                        &format!(
                            "UPDATE jobs SET status = 'success', attempts = attempts + 1,
                             provider_message_id = ?2, sent_at = {NOW}, updated_at = {NOW}
                             WHERE id = ?1"
                        ),
                        params![key, provider_message_id.as_str()],
                    )?;
                }
                SendOutcome::Failed { error } => {
                    tx.execute(
                        &format!(
                            "UPDATE jobs SET status = 'failed', attempts = attempts + 1,
                             last_error = ?2, updated_at = {NOW}
                             WHERE id = ?1"
                        ),
                        params![key, error],
                    )?;
                }
            }

            campaigns::apply_settlement(&tx, &campaign_id, outcome.is_delivered())?;
            let campaign = campaigns::fetch(&tx, &campaign_id)?;
            tx.commit()?;
            Ok(campaign)
        })
        .await
        .map_err(map_tr_err)
}

/// Record a failed attempt that will be retried.
pub async fn record_retry(
    db: &Database,
    id: &JobId,
    error: &str,
) -> Result<Option<Campaign>, CourierError> {
    let key = id.0.clone();
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(campaign_id) = open_job_campaign(&tx, &key)? else {
                return Ok(None);
            };
            tx.execute(
                &format!(
                    "UPDATE jobs SET status = 'processing', attempts = attempts + 1,
                     last_error = ?2, updated_at = {NOW}
                     WHERE id = ?1"
                ),
                params![key, error],
            )?;
            campaigns::mark_started(&tx, &campaign_id)?;
            let campaign = campaigns::fetch(&tx, &campaign_id)?;
            tx.commit()?;
            Ok(campaign)
        })
        .await
        .map_err(map_tr_err)
}

/// Non-terminal jobs whose last update is at least `older_than_secs` old.
pub async fn stale_jobs(db: &Database, older_than_secs: u64) -> Result<Vec<Job>, CourierError> {
    let modifier = format!("-{older_than_secs} seconds");
    db.connection()
        .call(move |conn| {
            // A job touched within the grace period means some process is
            // still draining this ledger; its queue may hold any open job.
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM jobs
                 WHERE status IN ('queued', 'processing')
                   AND updated_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1)
                   AND NOT EXISTS (
                       SELECT 1 FROM jobs AS busy
                       WHERE busy.updated_at > strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1)
                   )
                 ORDER BY updated_at ASC, campaign_id, seq ASC"
            ))?;
            let rows = stmt.query_map(params![modifier], job_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
