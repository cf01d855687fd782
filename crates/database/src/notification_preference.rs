//! Notification preference operations.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::NotificationPreference;

const SELECT_COLUMNS: &str = r#"
    SELECT user_id, whatsapp_enabled, whatsapp_number, email_enabled, reminder_lead_time,
           morning_briefing_enabled, morning_briefing_time, user_timezone
    FROM notification_preferences
"#;

/// Get the stored preference row, if any.
pub async fn get_preference(pool: &SqlitePool, user_id: &str) -> Result<Option<NotificationPreference>> {
    let pref = sqlx::query_as::<_, NotificationPreference>(&format!("{SELECT_COLUMNS} WHERE user_id = ?"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(pref)
}

/// Get the stored preference or the defaults.
pub async fn get_or_default(pool: &SqlitePool, user_id: &str) -> Result<NotificationPreference> {
    Ok(get_preference(pool, user_id)
        .await?
        .unwrap_or_else(|| NotificationPreference::defaults_for(user_id)))
}

/// Insert or replace a user's preference.
pub async fn upsert_preference(pool: &SqlitePool, pref: &NotificationPreference) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO notification_preferences (
            user_id, whatsapp_enabled, whatsapp_number, email_enabled, reminder_lead_time,
            morning_briefing_enabled, morning_briefing_time, user_timezone, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))
        ON CONFLICT(user_id) DO UPDATE SET
            whatsapp_enabled = excluded.whatsapp_enabled,
            whatsapp_number = excluded.whatsapp_number,
            email_enabled = excluded.email_enabled,
            reminder_lead_time = excluded.reminder_lead_time,
            morning_briefing_enabled = excluded.morning_briefing_enabled,
            morning_briefing_time = excluded.morning_briefing_time,
            user_timezone = excluded.user_timezone,
            updated_at = datetime('now')
        "#,
    )
    .bind(&pref.user_id)
    .bind(pref.whatsapp_enabled)
    .bind(&pref.whatsapp_number)
    .bind(pref.email_enabled)
    .bind(pref.reminder_lead_time)
    .bind(pref.morning_briefing_enabled)
    .bind(&pref.morning_briefing_time)
    .bind(&pref.user_timezone)
    .execute(pool)
    .await?;

    Ok(())
}

/// Preferences with at least one reminder channel enabled.
pub async fn list_with_channel_enabled(pool: &SqlitePool) -> Result<Vec<NotificationPreference>> {
    let prefs = sqlx::query_as::<_, NotificationPreference>(&format!(
        "{SELECT_COLUMNS} WHERE whatsapp_enabled = 1 OR email_enabled = 1 ORDER BY user_id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(prefs)
}

/// Preferences with the morning briefing enabled.
pub async fn list_briefing_enabled(pool: &SqlitePool) -> Result<Vec<NotificationPreference>> {
    let prefs = sqlx::query_as::<_, NotificationPreference>(&format!(
        "{SELECT_COLUMNS} WHERE morning_briefing_enabled = 1 ORDER BY user_id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(prefs)
}

/// Find a preference by WhatsApp number, tolerating a missing or extra `+`.
pub async fn find_by_whatsapp_number(pool: &SqlitePool, number: &str) -> Result<Option<NotificationPreference>> {
    let number = number.trim();
    if number.is_empty() {
        return Ok(None);
    }

    let alternate = match number.strip_prefix('+') {
        Some(rest) => rest.to_string(),
        None => format!("+{number}"),
    };

    let pref = sqlx::query_as::<_, NotificationPreference>(&format!(
        "{SELECT_COLUMNS} WHERE whatsapp_number = ? OR whatsapp_number = ? ORDER BY whatsapp_number = ? DESC LIMIT 1"
    ))
    .bind(number)
    .bind(&alternate)
    .bind(number)
    .fetch_optional(pool)
    .await?;

    Ok(pref)
}

/// Turn the WhatsApp channel off for a user.
pub async fn disable_whatsapp(pool: &SqlitePool, user_id: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE notification_preferences
        SET whatsapp_enabled = 0, updated_at = datetime('now')
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
