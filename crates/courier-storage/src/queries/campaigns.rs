// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign ledger operations.

use courier_core::types::timestamp_now;
use courier_core::{Campaign, CampaignId, CampaignStatus, CourierError, NewCampaign};
use rusqlite::{OptionalExtension, Row, params};

use super::{NOW, json_column, json_text, parse_column};
use crate::database::{Database, map_tr_err};

const CAMPAIGN_COLUMNS: &str = "id, template_name, language_code, components, total, queued,
     success, failed, status, error, created_at, started_at, finished_at";

pub(crate) fn campaign_from_row(row: &Row<'_>) -> rusqlite::Result<Campaign> {
    Ok(Campaign {
        id: CampaignId(row.get(0)?),
        template_name: row.get(1)?,
        language_code: row.get(2)?,
        components: json_column(3, row.get(3)?)?,
        total: row.get(4)?,
        queued: row.get(5)?,
        success: row.get(6)?,
        failed: row.get(7)?,
        status: parse_column(8, row.get(8)?)?,
        error: row.get(9)?,
        created_at: row.get(10)?,
        started_at: row.get(11)?,
        finished_at: row.get(12)?,
    })
}

/// Read a campaign on an already-borrowed connection (used inside transactions).
pub(crate) fn fetch(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<Campaign>> {
    conn.query_row(
        &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"),
        params![id],
        campaign_from_row,
    )
    .optional()
}

/// Apply one settled job to a campaign's counters in a single UPDATE.
///
/// SET expressions see the pre-update row, so `success + failed + 1`
/// is the settled count after this job.
pub(crate) fn apply_settlement(
    conn: &rusqlite::Connection,
    id: &str,
    delivered: bool,
) -> rusqlite::Result<usize> {
    let column = if delivered { "success" } else { "failed" };
    conn.execute(
        &format!(
            "UPDATE campaigns SET
                queued = queued - 1,
                {column} = {column} + 1,
                started_at = COALESCE(started_at, {NOW}),
                status = CASE WHEN success + failed + 1 = total
                              THEN 'completed' ELSE 'processing' END,
                finished_at = CASE WHEN success + failed + 1 = total
                                   THEN {NOW} ELSE finished_at END
             WHERE id = ?1"
        ),
        params![id],
    )
}

/// Mark a campaign as started without touching its counters.
pub(crate) fn mark_started(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            "UPDATE campaigns SET
                started_at = COALESCE(started_at, {NOW}),
                status = CASE WHEN status = 'queued' THEN 'processing' ELSE status END
             WHERE id = ?1"
        ),
        params![id],
    )
}

/// Insert a new campaign in `queued` state.
pub async fn create_campaign(
    db: &Database,
    campaign: &NewCampaign,
) -> Result<Campaign, CourierError> {
    let row = Campaign {
        id: campaign.id.clone(),
        template_name: campaign.template_name.clone(),
        language_code: campaign.language_code.clone(),
        components: campaign.components.clone(),
        total: campaign.total,
        queued: campaign.total,
        success: 0,
        failed: 0,
        status: CampaignStatus::Queued,
        error: None,
        created_at: timestamp_now(),
        started_at: None,
        finished_at: None,
    };
    let insert = row.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO campaigns (id, template_name, language_code, components,
                 total, queued, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    insert.id.0,
                    insert.template_name,
                    insert.language_code,
                    json_text(insert.components.as_ref()),
                    insert.total,
                    insert.queued,
                    insert.status.to_string(),
                    insert.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(row)
}

/// Move a `queued` campaign to `failed`.
///
/// Campaigns past `queued` are left untouched; an unknown id is `NotFound`.
pub async fn mark_failed(db: &Database, id: &CampaignId, reason: &str) -> Result<(), CourierError> {
    let key = id.0.clone();
    let reason = reason.to_string();
    let exists = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE campaigns SET status = 'failed', error = ?2, finished_at = {NOW}
                     WHERE id = ?1 AND status = 'queued'"
                ),
                params![key, reason],
            )?;
            if changed > 0 {
                return Ok(true);
            }
            Ok(fetch(conn, &key)?.is_some())
        })
        .await
        .map_err(map_tr_err)?;

    if exists {
        Ok(())
    } else {
        Err(CourierError::NotFound {
            kind: "campaign",
            id: id.0.clone(),
        })
    }
}

/// Get a campaign by ID.
pub async fn get_campaign(db: &Database, id: &CampaignId) -> Result<Option<Campaign>, CourierError> {
    let key = id.0.clone();
    db.connection()
        .call(move |conn| fetch(conn, &key))
        .await
        .map_err(map_tr_err)
}

/// List campaigns newest first, optionally filtered by status.
pub async fn list_campaigns(
    db: &Database,
    status: Option<CampaignStatus>,
    limit: Option<u32>,
) -> Result<Vec<Campaign>, CourierError> {
    let status = status.map(|s| s.to_string());
    // SQLite treats a negative LIMIT as "no limit".
    let limit = limit.map(i64::from).unwrap_or(-1);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns
                 WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![status, limit], campaign_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
