//! Calendar OAuth credential storage.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::CalendarCredential;

/// Get a user's stored credential.
pub async fn get_credential(pool: &SqlitePool, user_id: &str) -> Result<Option<CalendarCredential>> {
    let credential = sqlx::query_as::<_, CalendarCredential>(
        r#"
        SELECT user_id, access_token, refresh_token, expires_at
        FROM calendar_credentials
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(credential)
}

/// Insert or replace a credential.
pub async fn upsert_credential(pool: &SqlitePool, credential: &CalendarCredential) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO calendar_credentials (user_id, access_token, refresh_token, expires_at, updated_at)
        VALUES (?, ?, ?, ?, datetime('now'))
        ON CONFLICT(user_id) DO UPDATE SET
            access_token = excluded.access_token,
            refresh_token = COALESCE(excluded.refresh_token, calendar_credentials.refresh_token),
            expires_at = excluded.expires_at,
            updated_at = datetime('now')
        "#,
    )
    .bind(&credential.user_id)
    .bind(&credential.access_token)
    .bind(&credential.refresh_token)
    .bind(credential.expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Store a refreshed access token.
pub async fn update_access_token(
    pool: &SqlitePool,
    user_id: &str,
    access_token: &str,
    expires_at: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE calendar_credentials
        SET access_token = ?, expires_at = ?, updated_at = datetime('now')
        WHERE user_id = ?
        "#,
    )
    .bind(access_token)
    .bind(expires_at)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove a user's credential (disconnect).
pub async fn delete_credential(pool: &SqlitePool, user_id: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM calendar_credentials
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
