// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation CRUD operations.

use rusqlite::params;
use switchboard_core::{ConversationState, SwitchboardError};

use crate::database::{parse_text_col, Database};
use crate::models::Conversation;

const CONVERSATION_COLUMNS: &str =
    "id, channel, contact_address, state, assigned_queue_id, next_seq, last_activity_at, created_at";

fn row_to_conversation(row: &rusqlite::Row<'_>) -> Result<Conversation, rusqlite::Error> {
    Ok(Conversation {
        id: row.get(0)?,
        channel: parse_text_col(1, row.get::<_, String>(1)?)?,
        contact_address: row.get(2)?,
        state: parse_text_col(3, row.get::<_, String>(3)?)?,
        assigned_queue_id: row.get(4)?,
        next_seq: row.get(5)?,
        last_activity_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Create a new conversation.
pub async fn create_conversation(
    db: &Database,
    conversation: &Conversation,
) -> Result<(), SwitchboardError> {
    let c = conversation.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations
                 (id, channel, contact_address, state, assigned_queue_id, next_seq, last_activity_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    c.id,
                    c.channel.to_string(),
                    c.contact_address,
                    c.state.to_string(),
                    c.assigned_queue_id,
                    c.next_seq,
                    c.last_activity_at,
                    c.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a conversation by ID.
pub async fn get_conversation(
    db: &Database,
    id: &str,
) -> Result<Option<Conversation>, SwitchboardError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_conversation);
            match result {
                Ok(conversation) => Ok(Some(conversation)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find the conversation for a contact address on a channel.
///
/// At most one exists per (channel, contact_address) pair; the schema
/// enforces this with a unique index.
pub async fn find_by_contact(
    db: &Database,
    channel: &str,
    contact_address: &str,
) -> Result<Option<Conversation>, SwitchboardError> {
    let channel = channel.to_string();
    let contact_address = contact_address.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE channel = ?1 AND contact_address = ?2"
            ))?;
            let result = stmt.query_row(params![channel, contact_address], row_to_conversation);
            match result {
                Ok(conversation) => Ok(Some(conversation)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Update a conversation's state and refresh its activity timestamp.
pub async fn update_state(
    db: &Database,
    id: &str,
    state: &ConversationState,
) -> Result<(), SwitchboardError> {
    let id = id.to_string();
    let state = state.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations
                 SET state = ?1, last_activity_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![state, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Set or clear the queue a conversation is bound to.
pub async fn set_queue(
    db: &Database,
    id: &str,
    queue_id: Option<&str>,
) -> Result<(), SwitchboardError> {
    let id = id.to_string();
    let queue_id = queue_id.map(|q| q.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET assigned_queue_id = ?1 WHERE id = ?2",
                params![queue_id, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List conversations, optionally filtered by exact state encoding.
pub async fn list_conversations(
    db: &Database,
    state: Option<&str>,
) -> Result<Vec<Conversation>, SwitchboardError> {
    let state = state.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut conversations = Vec::new();
            match &state {
                Some(state_filter) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {CONVERSATION_COLUMNS} FROM conversations
                         WHERE state = ?1 ORDER BY last_activity_at DESC"
                    ))?;
                    let rows = stmt.query_map(params![state_filter], row_to_conversation)?;
                    for row in rows {
                        conversations.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {CONVERSATION_COLUMNS} FROM conversations
                         ORDER BY last_activity_at DESC"
                    ))?;
                    let rows = stmt.query_map([], row_to_conversation)?;
                    for row in rows {
                        conversations.push(row?);
                    }
                }
            }
            Ok(conversations)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List conversations parked in the waiting state, oldest activity first.
///
/// Used on startup to rebuild the queue wait-lists in arrival order.
pub async fn list_waiting(db: &Database) -> Result<Vec<Conversation>, SwitchboardError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE state = 'waiting' ORDER BY last_activity_at ASC"
            ))?;
            let rows = stmt.query_map([], row_to_conversation)?;
            let mut conversations = Vec::new();
            for row in rows {
                conversations.push(row?);
            }
            Ok(conversations)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List conversations currently assigned to any agent.
///
/// Used on startup to rebuild queue slot occupancy.
pub async fn list_assigned(db: &Database) -> Result<Vec<Conversation>, SwitchboardError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE state LIKE 'agent:%' ORDER BY last_activity_at ASC"
            ))?;
            let rows = stmt.query_map([], row_to_conversation)?;
            let mut conversations = Vec::new();
            for row in rows {
                conversations.push(row?);
            }
            Ok(conversations)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List open, non-waiting conversations whose last activity predates `cutoff`.
///
/// Waiting conversations are deliberately excluded: they belong to the
/// queue until an agent takes them, however long that takes.
pub async fn list_idle_open(
    db: &Database,
    cutoff: &str,
) -> Result<Vec<Conversation>, SwitchboardError> {
    let cutoff = cutoff.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE state != 'closed' AND state != 'waiting' AND last_activity_at < ?1
                 ORDER BY last_activity_at ASC"
            ))?;
            let rows = stmt.query_map(params![cutoff], row_to_conversation)?;
            let mut conversations = Vec::new();
            for row in rows {
                conversations.push(row?);
            }
            Ok(conversations)
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

    fn make_conversation(id: &str, address: &str) -> Conversation {
        Conversation {
            id: id.to_string(),
            channel: ChannelKind::Web,
            contact_address: address.to_string(),
            state: ConversationState::Bot,
            assigned_queue_id: None,
            next_seq: 1,
            last_activity_at: "2026-01-01T00:00:00.000Z".to_string(),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_get_conversation_roundtrips() {
        let (db, _dir) = setup_db().await;
        let conversation = make_conversation("c1", "sess-1");

        create_conversation(&db, &conversation).await.unwrap();
        let retrieved = get_conversation(&db, "c1").await.unwrap().unwrap();
        assert_eq!(retrieved.id, "c1");
        assert_eq!(retrieved.channel, ChannelKind::Web);
        assert_eq!(retrieved.state, ConversationState::Bot);
        assert_eq!(retrieved.next_seq, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_nonexistent_conversation_returns_none() {
        let (db, _dir) = setup_db().await;
        let result = get_conversation(&db, "no-such-conversation").await.unwrap();
        assert!(result.is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn find_by_contact_matches_channel_and_address() {
        let (db, _dir) = setup_db().await;
        create_conversation(&db, &make_conversation("c1", "sess-1"))
            .await
            .unwrap();

        let found = find_by_contact(&db, "web", "sess-1").await.unwrap();
        assert_eq!(found.unwrap().id, "c1");

        let wrong_channel = find_by_contact(&db, "whatsapp", "sess-1").await.unwrap();
        assert!(wrong_channel.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn update_state_persists_agent_assignment() {
        let (db, _dir) = setup_db().await;
        create_conversation(&db, &make_conversation("c1", "sess-1"))
            .await
            .unwrap();

        let assigned = ConversationState::WithAgent("alice".to_string());
        update_state(&db, "c1", &assigned).await.unwrap();

        let retrieved = get_conversation(&db, "c1").await.unwrap().unwrap();
        assert_eq!(retrieved.state, assigned);
        assert_eq!(retrieved.assigned_agent(), Some("alice"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn set_queue_binds_and_clears() {
        let (db, _dir) = setup_db().await;
        create_conversation(&db, &make_conversation("c1", "sess-1"))
            .await
            .unwrap();

        set_queue(&db, "c1", Some("support")).await.unwrap();
        let c = get_conversation(&db, "c1").await.unwrap().unwrap();
        assert_eq!(c.assigned_queue_id.as_deref(), Some("support"));

        set_queue(&db, "c1", None).await.unwrap();
        let c = get_conversation(&db, "c1").await.unwrap().unwrap();
        assert!(c.assigned_queue_id.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_conversations_with_state_filter() {
        let (db, _dir) = setup_db().await;
        create_conversation(&db, &make_conversation("c1", "a1"))
            .await
            .unwrap();
        create_conversation(&db, &make_conversation("c2", "a2"))
            .await
            .unwrap();
        update_state(&db, "c2", &ConversationState::Closed)
            .await
            .unwrap();

        let all = list_conversations(&db, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let bot = list_conversations(&db, Some("bot")).await.unwrap();
        assert_eq!(bot.len(), 1);
        assert_eq!(bot[0].id, "c1");

        let closed = list_conversations(&db, Some("closed")).await.unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].id, "c2");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_waiting_and_assigned_split_by_state() {
        let (db, _dir) = setup_db().await;
        create_conversation(&db, &make_conversation("c1", "a1"))
            .await
            .unwrap();
        create_conversation(&db, &make_conversation("c2", "a2"))
            .await
            .unwrap();
        create_conversation(&db, &make_conversation("c3", "a3"))
            .await
            .unwrap();
        update_state(&db, "c1", &ConversationState::WaitingHuman)
            .await
            .unwrap();
        update_state(&db, "c2", &ConversationState::WithAgent("bob".to_string()))
            .await
            .unwrap();

        let waiting = list_waiting(&db).await.unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].id, "c1");

        let assigned = list_assigned(&db).await.unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].id, "c2");
        assert_eq!(assigned[0].assigned_agent(), Some("bob"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_idle_open_skips_waiting_and_closed() {
        let (db, _dir) = setup_db().await;
        for (id, addr) in [("c1", "a1"), ("c2", "a2"), ("c3", "a3"), ("c4", "a4")] {
            create_conversation(&db, &make_conversation(id, addr))
                .await
                .unwrap();
        }
        // c2 waits, c3 is closed; both must never show up as idle.
        update_state(&db, "c2", &ConversationState::WaitingHuman)
            .await
            .unwrap();
        update_state(&db, "c3", &ConversationState::Closed)
            .await
            .unwrap();

        // update_state refreshed c2/c3 timestamps; c1 and c4 still carry
        // the 2026-01-01 fixture timestamp, well before the cutoff.
        let idle = list_idle_open(&db, "2026-06-01T00:00:00.000Z").await.unwrap();
        let ids: Vec<&str> = idle.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c4"]);

        db.close().await.unwrap();
    }
}
