// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message persistence and sequence allocation.
//!
//! Sequence numbers are allocated inside the same transaction that
//! inserts the message row, so every persisted message occupies the
//! next slot in its conversation with no gaps and no duplicates,
//! regardless of how many writers race on the call path.

use rusqlite::params;
use switchboard_core::SwitchboardError;
use uuid::Uuid;

use crate::database::{parse_text_col, Database};
use crate::models::{now_rfc3339, DeliveryStatus, Message, NewMessage};

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, seq, sender_kind, sender_id, content, delivery_status, created_at";

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<Message, rusqlite::Error> {
    let delivery_raw: Option<String> = row.get(6)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        seq: row.get(2)?,
        sender_kind: parse_text_col(3, row.get::<_, String>(3)?)?,
        sender_id: row.get(4)?,
        content: row.get(5)?,
        delivery_status: delivery_raw.map(|s| parse_text_col(6, s)).transpose()?,
        created_at: row.get(7)?,
    })
}

/// Append a message to a conversation, allocating its sequence number.
///
/// Reads the conversation's `next_seq`, inserts the message at that
/// position and advances the counter, all in one transaction. Returns
/// [`SwitchboardError::NotFound`] if the conversation does not exist.
pub async fn append_message(
    db: &Database,
    conversation_id: &str,
    new_message: NewMessage,
) -> Result<Message, SwitchboardError> {
    let conversation_id = conversation_id.to_string();
    let id = Uuid::new_v4().to_string();
    let created_at = now_rfc3339();

    let inserted = {
        let conversation_id = conversation_id.clone();
        db.connection()
            .call(move |conn| {
                let tx = conn.transaction()?;

                let seq: i64 = {
                    let result = tx.query_row(
                        "SELECT next_seq FROM conversations WHERE id = ?1",
                        params![conversation_id],
                        |row| row.get(0),
                    );
                    match result {
                        Ok(seq) => seq,
                        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                        Err(e) => return Err(e.into()),
                    }
                };

                tx.execute(
                    "INSERT INTO messages
                     (id, conversation_id, seq, sender_kind, sender_id, content, delivery_status, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        id,
                        conversation_id,
                        seq,
                        new_message.sender_kind.to_string(),
                        new_message.sender_id,
                        new_message.content,
                        new_message.delivery_status.map(|s| s.to_string()),
                        created_at,
                    ],
                )?;
                tx.execute(
                    "UPDATE conversations SET next_seq = ?1, last_activity_at = ?2 WHERE id = ?3",
                    params![seq + 1, created_at, conversation_id],
                )?;
                tx.commit()?;

                Ok(Some(Message {
                    id,
                    conversation_id,
                    seq,
                    sender_kind: new_message.sender_kind,
                    sender_id: new_message.sender_id,
                    content: new_message.content,
                    delivery_status: new_message.delivery_status,
                    created_at,
                }))
            })
            .await
            .map_err(crate::database::map_tr_err)?
    };

    inserted.ok_or_else(|| SwitchboardError::NotFound {
        kind: "conversation",
        id: conversation_id,
    })
}

/// Apply a state transition and append its audit message atomically.
///
/// The state column, the activity timestamp, the audit row and the seq
/// advance all commit together: replayed history can never show a
/// transition without its audit entry or vice versa. Returns the audit
/// message, or [`SwitchboardError::NotFound`] for an unknown
/// conversation.
pub async fn append_transition(
    db: &Database,
    conversation_id: &str,
    new_state: &switchboard_core::ConversationState,
    audit: NewMessage,
) -> Result<Message, SwitchboardError> {
    let conversation_id = conversation_id.to_string();
    let state = new_state.to_string();
    let id = Uuid::new_v4().to_string();
    let created_at = now_rfc3339();

    let inserted = {
        let conversation_id = conversation_id.clone();
        db.connection()
            .call(move |conn| {
                let tx = conn.transaction()?;

                let seq: i64 = {
                    let result = tx.query_row(
                        "SELECT next_seq FROM conversations WHERE id = ?1",
                        params![conversation_id],
                        |row| row.get(0),
                    );
                    match result {
                        Ok(seq) => seq,
                        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                        Err(e) => return Err(e.into()),
                    }
                };

                tx.execute(
                    "INSERT INTO messages
                     (id, conversation_id, seq, sender_kind, sender_id, content, delivery_status, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        id,
                        conversation_id,
                        seq,
                        audit.sender_kind.to_string(),
                        audit.sender_id,
                        audit.content,
                        audit.delivery_status.map(|s| s.to_string()),
                        created_at,
                    ],
                )?;
                tx.execute(
                    "UPDATE conversations
                     SET state = ?1, next_seq = ?2, last_activity_at = ?3
                     WHERE id = ?4",
                    params![state, seq + 1, created_at, conversation_id],
                )?;
                tx.commit()?;

                Ok(Some(Message {
                    id,
                    conversation_id,
                    seq,
                    sender_kind: audit.sender_kind,
                    sender_id: audit.sender_id,
                    content: audit.content,
                    delivery_status: audit.delivery_status,
                    created_at,
                }))
            })
            .await
            .map_err(crate::database::map_tr_err)?
    };

    inserted.ok_or_else(|| SwitchboardError::NotFound {
        kind: "conversation",
        id: conversation_id,
    })
}

/// Fetch all messages in a conversation with `seq` greater than `since_seq`,
/// ordered ascending. `since_seq = 0` returns the full history.
pub async fn get_messages_since(
    db: &Database,
    conversation_id: &str,
    since_seq: i64,
) -> Result<Vec<Message>, SwitchboardError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1 AND seq > ?2
                 ORDER BY seq ASC"
            ))?;
            let rows = stmt.query_map(params![conversation_id, since_seq], row_to_message)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the delivery outcome for an outbound message.
pub async fn mark_delivery(
    db: &Database,
    message_id: &str,
    status: DeliveryStatus,
) -> Result<(), SwitchboardError> {
    let message_id = message_id.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET delivery_status = ?1 WHERE id = ?2",
                params![status, message_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
