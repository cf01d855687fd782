//! Conversation operations, including the per-conversation pending action.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{Conversation, DEFAULT_CONVERSATION_TITLE, MAX_TITLE_LENGTH};

/// Create a conversation with the default title.
pub async fn create_conversation(pool: &SqlitePool, id: &str, user_id: &str) -> Result<Conversation> {
    sqlx::query(
        r#"
        INSERT INTO conversations (id, user_id, title)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(DEFAULT_CONVERSATION_TITLE)
    .execute(pool)
    .await
    .map_err(DatabaseError::on_unique("Conversation", id))?;

    get_conversation(pool, id).await
}

/// Get a conversation by ID.
pub async fn get_conversation(pool: &SqlitePool, id: &str) -> Result<Conversation> {
    sqlx::query_as::<_, Conversation>(
        r#"
        SELECT id, user_id, title, pending_action, pending_message_id, created_at, updated_at
        FROM conversations
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Conversation",
        id: id.to_string(),
    })
}

/// Get a conversation only if it belongs to the given user.
pub async fn get_user_conversation(pool: &SqlitePool, id: &str, user_id: &str) -> Result<Conversation> {
    let conversation = get_conversation(pool, id).await?;
    if conversation.user_id != user_id {
        return Err(DatabaseError::NotFound {
            entity: "Conversation",
            id: id.to_string(),
        });
    }
    Ok(conversation)
}

/// List a user's conversations, most recently updated first.
pub async fn list_conversations(pool: &SqlitePool, user_id: &str) -> Result<Vec<Conversation>> {
    let conversations = sqlx::query_as::<_, Conversation>(
        r#"
        SELECT id, user_id, title, pending_action, pending_message_id, created_at, updated_at
        FROM conversations
        WHERE user_id = ?
        ORDER BY updated_at DESC, id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(conversations)
}

/// Set the title, truncated to the maximum length.
pub async fn update_title(pool: &SqlitePool, id: &str, title: &str) -> Result<()> {
    let title: String = title.chars().take(MAX_TITLE_LENGTH).collect();
    let result = sqlx::query(
        r#"
        UPDATE conversations
        SET title = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(&title)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Conversation",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Bump the updated timestamp.
pub async fn touch(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE conversations
        SET updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Replace the pending action. `None` clears it.
pub async fn set_pending_action(
    pool: &SqlitePool,
    id: &str,
    pending_action: Option<&str>,
    message_id: Option<i64>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE conversations
        SET pending_action = ?, pending_message_id = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(pending_action)
    .bind(message_id)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Conversation",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Delete a conversation and its messages.
pub async fn delete_conversation(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM conversations
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Conversation",
            id: id.to_string(),
        });
    }

    Ok(())
}
