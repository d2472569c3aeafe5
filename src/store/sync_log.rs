use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

/// Outcome record of one sync pass over one folder.
#[derive(Debug, Clone)]
pub struct SyncLogEntry {
    pub id: i64,
    pub folder_id: Option<i64>,
    pub day: String,
    pub files_seen: i64,
    pub files_processed: i64,
    pub errors: Option<String>,
    pub trigger_kind: String,
    pub created_at: String,
}

impl SyncLogEntry {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            folder_id: row.get("folder_id"),
            day: row.get("day"),
            files_seen: row.get("files_seen"),
            files_processed: row.get("files_processed"),
            errors: row.get("errors"),
            trigger_kind: row.get("trigger_kind"),
            created_at: row.get("created_at"),
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn append(
    pool: &SqlitePool,
    folder_id: Option<i64>,
    day: &str,
    files_seen: i64,
    files_processed: i64,
    errors: Option<&str>,
    trigger_kind: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sync_log (folder_id, day, files_seen, files_processed, errors, trigger_kind)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(folder_id)
    .bind(day)
    .bind(files_seen)
    .bind(files_processed)
    .bind(errors)
    .bind(trigger_kind)
    .execute(pool)
    .await
    .context("append sync log")?;
    Ok(())
}

pub async fn for_day(pool: &SqlitePool, day: &str) -> Result<Vec<SyncLogEntry>> {
    let rows = sqlx::query("SELECT * FROM sync_log WHERE day = ? ORDER BY id")
        .bind(day)
        .fetch_all(pool)
        .await
        .context("list sync log for day")?;

    Ok(rows.iter().map(SyncLogEntry::from_row).collect())
}
