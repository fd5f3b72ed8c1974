// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign and recipient-snapshot operations.
//!
//! Recipient lists are frozen at creation time. The dispatch loop walks
//! the snapshot by `position`, and the campaign row's `cursor` records
//! the last position handled so a restart resumes where it left off.

use rusqlite::params;
use switchboard_core::{CampaignProgress, SwitchboardError};

use crate::database::{parse_text_col, Database};
use crate::models::{Campaign, CampaignRecipient, CampaignStatus, DeliveryStatus};

const CAMPAIGN_COLUMNS: &str =
    "id, name, template, channel, status, rate_per_second, cursor, created_at";

const RECIPIENT_COLUMNS: &str =
    "campaign_id, position, address, conversation_id, status, updated_at";

fn row_to_campaign(row: &rusqlite::Row<'_>) -> Result<Campaign, rusqlite::Error> {
    Ok(Campaign {
        id: row.get(0)?,
        name: row.get(1)?,
        template: row.get(2)?,
        channel: parse_text_col(3, row.get::<_, String>(3)?)?,
        status: parse_text_col(4, row.get::<_, String>(4)?)?,
        rate_per_second: row.get(5)?,
        cursor: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn row_to_recipient(row: &rusqlite::Row<'_>) -> Result<CampaignRecipient, rusqlite::Error> {
    Ok(CampaignRecipient {
        campaign_id: row.get(0)?,
        position: row.get(1)?,
        address: row.get(2)?,
        conversation_id: row.get(3)?,
        status: parse_text_col(4, row.get::<_, String>(4)?)?,
        updated_at: row.get(5)?,
    })
}

/// Create a campaign together with its frozen recipient snapshot.
///
/// The campaign row and every recipient row are inserted in one
/// transaction; a campaign is never visible with a partial snapshot.
/// Positions are assigned 1-based in the order the addresses are given.
pub async fn create_campaign(
    db: &Database,
    campaign: &Campaign,
    addresses: &[String],
) -> Result<(), SwitchboardError> {
    let c = campaign.clone();
    let addresses = addresses.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO campaigns
                 (id, name, template, channel, status, rate_per_second, cursor, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    c.id,
                    c.name,
                    c.template,
                    c.channel.to_string(),
                    c.status.to_string(),
                    c.rate_per_second,
                    c.cursor,
                    c.created_at,
                ],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO campaign_recipients
                     (campaign_id, position, address, conversation_id, status, updated_at)
                     VALUES (?1, ?2, ?3, NULL, 'pending', ?4)",
                )?;
                for (index, address) in addresses.iter().enumerate() {
                    stmt.execute(params![c.id, (index + 1) as i64, address, c.created_at])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a campaign by ID.
pub async fn get_campaign(db: &Database, id: &str) -> Result<Option<Campaign>, SwitchboardError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_campaign);
            match result {
                Ok(campaign) => Ok(Some(campaign)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List all campaigns, newest first.
pub async fn list_campaigns(db: &Database) -> Result<Vec<Campaign>, SwitchboardError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map([], row_to_campaign)?;
            let mut campaigns = Vec::new();
            for row in rows {
                campaigns.push(row?);
            }
            Ok(campaigns)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Per-status recipient counts for progress reporting.
pub async fn campaign_progress(
    db: &Database,
    id: &str,
) -> Result<CampaignProgress, SwitchboardError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let progress = conn.query_row(
                "SELECT
                     COUNT(*),
                     COALESCE(SUM(status = 'pending'), 0),
                     COALESCE(SUM(status = 'sent'), 0),
                     COALESCE(SUM(status = 'failed'), 0)
                 FROM campaign_recipients WHERE campaign_id = ?1",
                params![id],
                |row| {
                    Ok(CampaignProgress {
                        total: row.get(0)?,
                        pending: row.get(1)?,
                        sent: row.get(2)?,
                        failed: row.get(3)?,
                    })
                },
            )?;
            Ok(progress)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Transition a campaign's status only if it currently holds `expected`.
///
/// Returns `true` when the row was updated. A `false` return means some
/// other caller won the transition; the campaign was left untouched.
pub async fn set_status_if(
    db: &Database,
    id: &str,
    expected: CampaignStatus,
    new_status: CampaignStatus,
) -> Result<bool, SwitchboardError> {
    let id = id.to_string();
    let expected = expected.to_string();
    let new_status = new_status.to_string();
    db.connection()
        .call(move |conn| {
            let rows = conn.execute(
                "UPDATE campaigns SET status = ?1 WHERE id = ?2 AND status = ?3",
                params![new_status, id, expected],
            )?;
            Ok(rows > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the outcome of one recipient send and advance the cursor.
///
/// Both writes land in one transaction so a crash between them cannot
/// leave the cursor pointing past an unrecorded recipient.
pub async fn record_send(
    db: &Database,
    campaign_id: &str,
    position: i64,
    status: DeliveryStatus,
    conversation_id: Option<&str>,
) -> Result<(), SwitchboardError> {
    let campaign_id = campaign_id.to_string();
    let status = status.to_string();
    let conversation_id = conversation_id.map(|c| c.to_string());
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE campaign_recipients
                 SET status = ?1, conversation_id = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE campaign_id = ?3 AND position = ?4",
                params![status, conversation_id, campaign_id, position],
            )?;
            tx.execute(
                "UPDATE campaigns SET cursor = ?1 WHERE id = ?2",
                params![position, campaign_id],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The first recipient still pending after `after_position`, if any.
///
/// Sent and failed rows are skipped, which is what makes a cursor reset
/// safe: re-walking from zero can never double-send.
pub async fn next_pending_recipient(
    db: &Database,
    campaign_id: &str,
    after_position: i64,
) -> Result<Option<CampaignRecipient>, SwitchboardError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECIPIENT_COLUMNS} FROM campaign_recipients
                 WHERE campaign_id = ?1 AND position > ?2 AND status = 'pending'
                 ORDER BY position ASC LIMIT 1"
            ))?;
            let result = stmt.query_row(params![campaign_id, after_position], row_to_recipient);
            match result {
                Ok(recipient) => Ok(Some(recipient)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch one recipient row by position.
pub async fn get_recipient(
    db: &Database,
    campaign_id: &str,
    position: i64,
) -> Result<Option<CampaignRecipient>, SwitchboardError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECIPIENT_COLUMNS} FROM campaign_recipients
                 WHERE campaign_id = ?1 AND position = ?2"
            ))?;
            let result = stmt.query_row(params![campaign_id, position], row_to_recipient);
            match result {
                Ok(recipient) => Ok(Some(recipient)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Put every failed recipient back in the pending pool and rewind the
/// cursor to the start. A finished campaign drops back to paused so it
/// can be resumed. Returns how many recipients were requeued.
///
/// Sent recipients keep their status, and the pending-only walk in
/// [`next_pending_recipient`] guarantees they are never sent again.
pub async fn requeue_failed(db: &Database, id: &str) -> Result<u64, SwitchboardError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let requeued = tx.execute(
                "UPDATE campaign_recipients
                 SET status = 'pending', updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE campaign_id = ?1 AND status = 'failed'",
                params![id],
            )?;
            tx.execute("UPDATE campaigns SET cursor = 0 WHERE id = ?1", params![id])?;
            tx.execute(
                "UPDATE campaigns SET status = 'paused' WHERE id = ?1 AND status = 'finished'",
                params![id],
            )?;
            tx.commit()?;
            Ok(requeued as u64)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Demote every campaign still marked running to paused.
///
/// Called once at startup: a running status on disk means the previous
/// process died mid-dispatch, and no dispatch task exists for it in
/// this process. Returns the affected campaign IDs.
pub async fn recover_running(db: &Database) -> Result<Vec<String>, SwitchboardError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let ids = {
                let mut stmt =
                    tx.prepare("SELECT id FROM campaigns WHERE status = 'running'")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut ids = Vec::new();
                for row in rows {
                    ids.push(row?);
                }
                ids
            };
            tx.execute(
                "UPDATE campaigns SET status = 'paused' WHERE status = 'running'",
                [],
            )?;
            tx.commit()?;
            Ok(ids)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::ChannelKind;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_campaign(id: &str) -> Campaign {
        Campaign {
            id: id.to_string(),
            name: "August promo".to_string(),
            template: "hello {name}".to_string(),
            channel: ChannelKind::Whatsapp,
            status: CampaignStatus::Draft,
            rate_per_second: 5,
            cursor: 0,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    fn addresses(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("+5511000000{i:02}")).collect()
    }

    #[tokio::test]
    async fn create_campaign_freezes_recipient_snapshot() {
        let (db, _dir) = setup_db().await;
        create_campaign(&db, &make_campaign("cam1"), &addresses(3))
            .await
            .unwrap();

        let campaign = get_campaign(&db, "cam1").await.unwrap().unwrap();
        assert_eq!(campaign.status, CampaignStatus::Draft);
        assert_eq!(campaign.cursor, 0);

        let progress = campaign_progress(&db, "cam1").await.unwrap();
        assert_eq!(progress.total, 3);
        assert_eq!(progress.pending, 3);
        assert_eq!(progress.sent, 0);

        let first = next_pending_recipient(&db, "cam1", 0).await.unwrap().unwrap();
        assert_eq!(first.position, 1);
        assert_eq!(first.address, "+551100000001");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn set_status_if_is_exactly_once() {
        let (db, _dir) = setup_db().await;
        create_campaign(&db, &make_campaign("cam1"), &addresses(1))
            .await
            .unwrap();

        let won = set_status_if(&db, "cam1", CampaignStatus::Draft, CampaignStatus::Running)
            .await
            .unwrap();
        assert!(won);

        // Second identical transition loses: the row is no longer draft.
        let second = set_status_if(&db, "cam1", CampaignStatus::Draft, CampaignStatus::Running)
            .await
            .unwrap();
        assert!(!second);

        let campaign = get_campaign(&db, "cam1").await.unwrap().unwrap();
        assert_eq!(campaign.status, CampaignStatus::Running);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn record_send_advances_cursor_with_outcome() {
        let (db, _dir) = setup_db().await;
        create_campaign(&db, &make_campaign("cam1"), &addresses(3))
            .await
            .unwrap();

        record_send(&db, "cam1", 1, DeliveryStatus::Sent, Some("conv-1"))
            .await
            .unwrap();
        record_send(&db, "cam1", 2, DeliveryStatus::Failed, None)
            .await
            .unwrap();

        let campaign = get_campaign(&db, "cam1").await.unwrap().unwrap();
        assert_eq!(campaign.cursor, 2);

        let sent = get_recipient(&db, "cam1", 1).await.unwrap().unwrap();
        assert_eq!(sent.status, DeliveryStatus::Sent);
        assert_eq!(sent.conversation_id.as_deref(), Some("conv-1"));

        // The walk resumes past both handled rows.
        let next = next_pending_recipient(&db, "cam1", campaign.cursor)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.position, 3);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn requeue_failed_rewinds_without_touching_sent() {
        let (db, _dir) = setup_db().await;
        create_campaign(&db, &make_campaign("cam1"), &addresses(3))
            .await
            .unwrap();
        record_send(&db, "cam1", 1, DeliveryStatus::Sent, Some("conv-1"))
            .await
            .unwrap();
        record_send(&db, "cam1", 2, DeliveryStatus::Failed, None)
            .await
            .unwrap();
        record_send(&db, "cam1", 3, DeliveryStatus::Sent, Some("conv-3"))
            .await
            .unwrap();
        assert!(
            set_status_if(&db, "cam1", CampaignStatus::Draft, CampaignStatus::Finished)
                .await
                .unwrap()
        );

        let requeued = requeue_failed(&db, "cam1").await.unwrap();
        assert_eq!(requeued, 1);

        let campaign = get_campaign(&db, "cam1").await.unwrap().unwrap();
        assert_eq!(campaign.cursor, 0);
        assert_eq!(campaign.status, CampaignStatus::Paused);

        // Only position 2 comes back; sent rows are skipped by the walk.
        let next = next_pending_recipient(&db, "cam1", 0).await.unwrap().unwrap();
        assert_eq!(next.position, 2);
        let after = next_pending_recipient(&db, "cam1", 2).await.unwrap();
        assert!(after.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn recover_running_demotes_to_paused() {
        let (db, _dir) = setup_db().await;
        create_campaign(&db, &make_campaign("cam1"), &addresses(1))
            .await
            .unwrap();
        create_campaign(&db, &make_campaign("cam2"), &addresses(1))
            .await
            .unwrap();
        set_status_if(&db, "cam1", CampaignStatus::Draft, CampaignStatus::Running)
            .await
            .unwrap();

        let recovered = recover_running(&db).await.unwrap();
        assert_eq!(recovered, vec!["cam1".to_string()]);

        let cam1 = get_campaign(&db, "cam1").await.unwrap().unwrap();
        assert_eq!(cam1.status, CampaignStatus::Paused);
        let cam2 = get_campaign(&db, "cam2").await.unwrap().unwrap();
        assert_eq!(cam2.status, CampaignStatus::Draft);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_campaigns_returns_all() {
        let (db, _dir) = setup_db().await;
        create_campaign(&db, &make_campaign("cam1"), &addresses(1))
            .await
            .unwrap();
        let mut second = make_campaign("cam2");
        second.created_at = "2026-02-01T00:00:00.000Z".to_string();
        create_campaign(&db, &second, &addresses(1)).await.unwrap();

        let all = list_campaigns(&db).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "cam2");

        db.close().await.unwrap();
    }
}
