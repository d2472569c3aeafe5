use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

/// A Drive folder the daemon ingests from.
#[derive(Debug, Clone)]
pub struct WatchedFolder {
    pub id: i64,
    pub drive_folder_id: String,
    pub folder_name: String,
    pub parent_drive_id: Option<String>,
    pub last_synced_at: Option<String>,
}

impl WatchedFolder {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            drive_folder_id: row.get("drive_folder_id"),
            folder_name: row.get("folder_name"),
            parent_drive_id: row.get("parent_drive_id"),
            last_synced_at: row.get("last_synced_at"),
        }
    }
}

/// Register a folder, or refresh its name/parent if it is already known.
/// Returns the local row id either way.
pub async fn upsert_folder(
    pool: &SqlitePool,
    drive_folder_id: &str,
    folder_name: &str,
    parent_drive_id: Option<&str>,
) -> Result<i64> {
    let row = sqlx::query(
        r#"
        INSERT INTO watched_folders (drive_folder_id, folder_name, parent_drive_id)
        VALUES (?, ?, ?)
        ON CONFLICT(drive_folder_id) DO UPDATE SET
            folder_name = excluded.folder_name,
            parent_drive_id = excluded.parent_drive_id
        RETURNING id
        "#,
    )
    .bind(drive_folder_id)
    .bind(folder_name)
    .bind(parent_drive_id)
    .fetch_one(pool)
    .await
    .context("upsert watched folder")?;

    Ok(row.get("id"))
}

pub async fn folder_by_name(pool: &SqlitePool, name: &str) -> Result<Option<WatchedFolder>> {
    let row = sqlx::query(
        "SELECT * FROM watched_folders WHERE folder_name = ? COLLATE NOCASE",
    )
    .bind(name)
    .fetch_optional(pool)
    .await
    .context("look up folder by name")?;

    Ok(row.map(|r| WatchedFolder::from_row(&r)))
}

pub async fn folder_by_drive_id(
    pool: &SqlitePool,
    drive_folder_id: &str,
) -> Result<Option<WatchedFolder>> {
    let row = sqlx::query("SELECT * FROM watched_folders WHERE drive_folder_id = ?")
        .bind(drive_folder_id)
        .fetch_optional(pool)
        .await
        .context("look up folder by drive id")?;

    Ok(row.map(|r| WatchedFolder::from_row(&r)))
}

pub async fn folder_by_id(pool: &SqlitePool, id: i64) -> Result<Option<WatchedFolder>> {
    let row = sqlx::query("SELECT * FROM watched_folders WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("look up folder by row id")?;

    Ok(row.map(|r| WatchedFolder::from_row(&r)))
}

pub async fn all_folders(pool: &SqlitePool) -> Result<Vec<WatchedFolder>> {
    let rows = sqlx::query("SELECT * FROM watched_folders ORDER BY folder_name")
        .fetch_all(pool)
        .await
        .context("list watched folders")?;

    Ok(rows.iter().map(WatchedFolder::from_row).collect())
}

/// Stamp a folder as synced now.
pub async fn touch_last_synced(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE watched_folders SET last_synced_at = datetime('now') WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("update last_synced_at")?;
    Ok(())
}
