//! Expiring key/value entries.

use sqlx::SqlitePool;

use crate::error::Result;

/// Get an unexpired value.
pub async fn get(pool: &SqlitePool, key: &str, now: i64) -> Result<Option<String>> {
    let value = sqlx::query_scalar::<_, String>(
        r#"
        SELECT value
        FROM cache_entries
        WHERE key = ? AND expires_at > ?
        "#,
    )
    .bind(key)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    Ok(value)
}

/// Set a value that expires at `expires_at` (unix seconds).
pub async fn set(pool: &SqlitePool, key: &str, value: &str, expires_at: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO cache_entries (key, value, expires_at)
        VALUES (?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            expires_at = excluded.expires_at
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove entries that expired before `now`.
pub async fn purge_expired(pool: &SqlitePool, now: i64) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM cache_entries
        WHERE expires_at <= ?
        "#,
    )
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
