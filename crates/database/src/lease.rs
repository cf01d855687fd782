//! Leadership leases for singleton background loops.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::Lease;

/// Try to acquire or renew a lease.
///
/// Succeeds when the lease is free, expired, or already held by `holder`.
/// The check and the write happen in one statement.
pub async fn try_acquire(pool: &SqlitePool, name: &str, holder: &str, now: i64, ttl_secs: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO leases (name, holder, expires_at)
        VALUES (?, ?, ?)
        ON CONFLICT(name) DO UPDATE SET
            holder = excluded.holder,
            expires_at = excluded.expires_at
        WHERE leases.holder = excluded.holder OR leases.expires_at <= ?
        "#,
    )
    .bind(name)
    .bind(holder)
    .bind(now + ttl_secs)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Release a lease if `holder` owns it.
pub async fn release(pool: &SqlitePool, name: &str, holder: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM leases
        WHERE name = ? AND holder = ?
        "#,
    )
    .bind(name)
    .bind(holder)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Current lease row, if any.
pub async fn get_lease(pool: &SqlitePool, name: &str) -> Result<Option<Lease>> {
    let lease = sqlx::query_as::<_, Lease>(
        r#"
        SELECT name, holder, expires_at
        FROM leases
        WHERE name = ?
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(lease)
}
