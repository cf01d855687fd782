//! Chat message storage.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{Message, NewMessage};

/// Insert a message and return its ID.
pub async fn insert_message(pool: &SqlitePool, message: &NewMessage) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO messages (conversation_id, sender, text, message_type, content)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&message.conversation_id)
    .bind(message.sender)
    .bind(&message.text)
    .bind(&message.message_type)
    .bind(&message.content)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Get a message by ID.
pub async fn get_message(pool: &SqlitePool, id: i64) -> Result<Message> {
    sqlx::query_as::<_, Message>(
        r#"
        SELECT id, conversation_id, sender, text, message_type, content, created_at
        FROM messages
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Message",
        id: id.to_string(),
    })
}

/// All messages of a conversation in insertion order.
pub async fn list_messages(pool: &SqlitePool, conversation_id: &str) -> Result<Vec<Message>> {
    let messages = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, conversation_id, sender, text, message_type, content, created_at
        FROM messages
        WHERE conversation_id = ?
        ORDER BY id
        "#,
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}

/// The most recent `limit` messages with non-empty text, oldest first.
pub async fn recent_messages(pool: &SqlitePool, conversation_id: &str, limit: i64) -> Result<Vec<Message>> {
    let mut messages = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, conversation_id, sender, text, message_type, content, created_at
        FROM messages
        WHERE conversation_id = ? AND trim(text) != ''
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(conversation_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    messages.reverse();
    Ok(messages)
}

/// Count messages in a conversation.
pub async fn count_messages(pool: &SqlitePool, conversation_id: &str) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM messages WHERE conversation_id = ?
        "#,
    )
    .bind(conversation_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Delete a message. Missing rows are ignored.
pub async fn delete_message(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM messages
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
