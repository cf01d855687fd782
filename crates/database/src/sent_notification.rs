//! The append-only notification ledger.
//!
//! Rows are only ever inserted, except for the snooze transition which
//! rewrites a `sent` row to `snoozed` with a fresh timestamp.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::{Channel, NotificationStatus, SentNotification};

/// Append a ledger row and return its ID.
pub async fn record(
    pool: &SqlitePool,
    user_id: &str,
    event_id: &str,
    channel: Channel,
    status: NotificationStatus,
    at: DateTime<Utc>,
) -> Result<i64> {
    record_with_message_id(pool, user_id, event_id, channel, status, at, None).await
}

/// Append a ledger row carrying the transport's message id.
pub async fn record_with_message_id(
    pool: &SqlitePool,
    user_id: &str,
    event_id: &str,
    channel: Channel,
    status: NotificationStatus,
    at: DateTime<Utc>,
    provider_message_id: Option<&str>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO sent_notifications (user_id, event_id, channel, status, timestamp, provider_message_id)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(event_id)
    .bind(channel)
    .bind(status)
    .bind(at)
    .bind(provider_message_id)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Event id of the notification the transport knows as `provider_message_id`.
pub async fn event_for_message(
    pool: &SqlitePool,
    user_id: &str,
    provider_message_id: &str,
) -> Result<Option<String>> {
    let event_id = sqlx::query_scalar::<_, String>(
        r#"
        SELECT event_id
        FROM sent_notifications
        WHERE user_id = ? AND provider_message_id = ?
        ORDER BY id DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(provider_message_id)
    .fetch_optional(pool)
    .await?;

    Ok(event_id)
}

/// Count rows with the given status.
pub async fn count_with_status(
    pool: &SqlitePool,
    user_id: &str,
    event_id: &str,
    channel: Channel,
    status: NotificationStatus,
) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM sent_notifications
        WHERE user_id = ? AND event_id = ? AND channel = ? AND status = ?
        "#,
    )
    .bind(user_id)
    .bind(event_id)
    .bind(channel)
    .bind(status)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Whether a `sent` row exists for the triple.
pub async fn has_sent(pool: &SqlitePool, user_id: &str, event_id: &str, channel: Channel) -> Result<bool> {
    Ok(count_with_status(pool, user_id, event_id, channel, NotificationStatus::Sent).await? > 0)
}

/// Number of recorded failures for the triple.
pub async fn failure_count(pool: &SqlitePool, user_id: &str, event_id: &str, channel: Channel) -> Result<i64> {
    count_with_status(pool, user_id, event_id, channel, NotificationStatus::Failed).await
}

/// Timestamp of the newest `snoozed` row for the triple.
pub async fn latest_snooze(
    pool: &SqlitePool,
    user_id: &str,
    event_id: &str,
    channel: Channel,
) -> Result<Option<DateTime<Utc>>> {
    let rows = sqlx::query_scalar::<_, DateTime<Utc>>(
        r#"
        SELECT timestamp
        FROM sent_notifications
        WHERE user_id = ? AND event_id = ? AND channel = ? AND status = 'snoozed'
        "#,
    )
    .bind(user_id)
    .bind(event_id)
    .bind(channel)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().max())
}

/// Rewrite the user's most recent `sent` WhatsApp row to `snoozed`.
///
/// Returns the event id of the snoozed row, or `None` if nothing was sent.
pub async fn snooze_latest_sent(pool: &SqlitePool, user_id: &str, now: DateTime<Utc>) -> Result<Option<String>> {
    let latest = sqlx::query_as::<_, SentNotification>(
        r#"
        SELECT id, user_id, event_id, channel, status, timestamp, provider_message_id
        FROM sent_notifications
        WHERE user_id = ? AND channel = 'whatsapp' AND status = 'sent'
        ORDER BY id DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match latest {
        Some(row) => {
            mark_snoozed(pool, row.id, now).await?;
            Ok(Some(row.event_id))
        }
        None => Ok(None),
    }
}

/// Rewrite the most recent `sent` WhatsApp row for one event to `snoozed`.
pub async fn snooze_latest_sent_for_event(
    pool: &SqlitePool,
    user_id: &str,
    event_id: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let latest = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id
        FROM sent_notifications
        WHERE user_id = ? AND event_id = ? AND channel = 'whatsapp' AND status = 'sent'
        ORDER BY id DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(event_id)
    .fetch_optional(pool)
    .await?;

    match latest {
        Some(id) => {
            mark_snoozed(pool, id, now).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

async fn mark_snoozed(pool: &SqlitePool, id: i64, now: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE sent_notifications
        SET status = 'snoozed', timestamp = ?
        WHERE id = ?
        "#,
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// All ledger rows for a user, oldest first.
pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<SentNotification>> {
    let rows = sqlx::query_as::<_, SentNotification>(
        r#"
        SELECT id, user_id, event_id, channel, status, timestamp, provider_message_id
        FROM sent_notifications
        WHERE user_id = ?
        ORDER BY id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
