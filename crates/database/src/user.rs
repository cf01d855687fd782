//! Users: identity plus the contact details the notifier needs.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::User;

/// Insert a new user; fails with `AlreadyExists` on a duplicate id.
pub async fn create_user(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query("INSERT INTO users (id, name, email) VALUES (?, ?, ?)")
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .execute(pool)
        .await
        .map_err(DatabaseError::on_unique("User", &user.id))?;

    Ok(())
}

/// Make sure a row exists for `id`, named after the id when created.
///
/// Returns true when the row was created by this call.
pub async fn ensure_user(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("INSERT INTO users (id, name) VALUES (?, ?) ON CONFLICT(id) DO NOTHING")
        .bind(id)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<User> {
    sqlx::query_as::<_, User>("SELECT id, name, email FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        })
}

/// Insert or replace a user's name and email.
pub async fn upsert_user(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, name, email)
        VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            email = excluded.email
        "#,
    )
    .bind(&user.id)
    .bind(&user.name)
    .bind(&user.email)
    .execute(pool)
    .await?;

    Ok(())
}
