use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

/// A registered push-notification channel and its change-feed cursor.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: i64,
    pub channel_id: String,
    pub resource_id: String,
    pub drive_folder_id: String,
    pub callback_url: String,
    pub page_token: String,
    pub expires_at: String,
    pub active: bool,
}

impl Subscription {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            channel_id: row.get("channel_id"),
            resource_id: row.get("resource_id"),
            drive_folder_id: row.get("drive_folder_id"),
            callback_url: row.get("callback_url"),
            page_token: row.get("page_token"),
            expires_at: row.get("expires_at"),
            active: row.get::<i64, _>("active") != 0,
        }
    }

    pub fn expires_at_utc(&self) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.expires_at)
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("bad expiry timestamp: {}", self.expires_at))
    }
}

pub async fn insert_subscription(
    pool: &SqlitePool,
    channel_id: &str,
    resource_id: &str,
    drive_folder_id: &str,
    callback_url: &str,
    page_token: &str,
    expires_at: DateTime<Utc>,
) -> Result<i64> {
    let row = sqlx::query(
        r#"
        INSERT INTO subscriptions
            (channel_id, resource_id, drive_folder_id, callback_url, page_token, expires_at, active)
        VALUES (?, ?, ?, ?, ?, ?, 1)
        RETURNING id
        "#,
    )
    .bind(channel_id)
    .bind(resource_id)
    .bind(drive_folder_id)
    .bind(callback_url)
    .bind(page_token)
    .bind(expires_at.to_rfc3339())
    .fetch_one(pool)
    .await
    .context("insert subscription")?;

    Ok(row.get("id"))
}

pub async fn subscription_by_channel(
    pool: &SqlitePool,
    channel_id: &str,
) -> Result<Option<Subscription>> {
    let row = sqlx::query("SELECT * FROM subscriptions WHERE channel_id = ?")
        .bind(channel_id)
        .fetch_optional(pool)
        .await
        .context("look up subscription by channel")?;

    Ok(row.map(|r| Subscription::from_row(&r)))
}

pub async fn active_for_folder(
    pool: &SqlitePool,
    drive_folder_id: &str,
) -> Result<Vec<Subscription>> {
    let rows = sqlx::query(
        "SELECT * FROM subscriptions WHERE drive_folder_id = ? AND active = 1 ORDER BY id",
    )
    .bind(drive_folder_id)
    .fetch_all(pool)
    .await
    .context("list active subscriptions for folder")?;

    Ok(rows.iter().map(Subscription::from_row).collect())
}

pub async fn all_active(pool: &SqlitePool) -> Result<Vec<Subscription>> {
    let rows = sqlx::query("SELECT * FROM subscriptions WHERE active = 1 ORDER BY expires_at")
        .fetch_all(pool)
        .await
        .context("list active subscriptions")?;

    Ok(rows.iter().map(Subscription::from_row).collect())
}

/// Persist the cursor a delta pass ended on. Done after the window has been
/// processed, so a crash mid-pass re-delivers rather than skips.
pub async fn update_page_token(pool: &SqlitePool, channel_id: &str, token: &str) -> Result<()> {
    sqlx::query("UPDATE subscriptions SET page_token = ? WHERE channel_id = ?")
        .bind(token)
        .bind(channel_id)
        .execute(pool)
        .await
        .context("update subscription cursor")?;
    Ok(())
}

pub async fn deactivate(pool: &SqlitePool, channel_id: &str) -> Result<()> {
    sqlx::query("UPDATE subscriptions SET active = 0 WHERE channel_id = ?")
        .bind(channel_id)
        .execute(pool)
        .await
        .context("deactivate subscription")?;
    Ok(())
}
