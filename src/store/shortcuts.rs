use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

/// A Drive shortcut resolved to its target, remembered so that change events
/// on the target can be attributed back to the watched folder holding the
/// shortcut.
#[derive(Debug, Clone)]
pub struct ShortcutBinding {
    pub shortcut_id: String,
    pub shortcut_name: String,
    pub target_file_id: String,
    pub target_name: Option<String>,
    pub watched_folder_id: i64,
}

impl ShortcutBinding {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Self {
        Self {
            shortcut_id: row.get("shortcut_id"),
            shortcut_name: row.get("shortcut_name"),
            target_file_id: row.get("target_file_id"),
            target_name: row.get("target_name"),
            watched_folder_id: row.get("watched_folder_id"),
        }
    }
}

pub async fn upsert_binding(
    pool: &SqlitePool,
    shortcut_id: &str,
    shortcut_name: &str,
    target_file_id: &str,
    target_name: Option<&str>,
    watched_folder_id: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO shortcut_bindings
            (shortcut_id, shortcut_name, target_file_id, target_name, watched_folder_id)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(shortcut_id, target_file_id) DO UPDATE SET
            shortcut_name = excluded.shortcut_name,
            target_name = excluded.target_name,
            watched_folder_id = excluded.watched_folder_id
        "#,
    )
    .bind(shortcut_id)
    .bind(shortcut_name)
    .bind(target_file_id)
    .bind(target_name)
    .bind(watched_folder_id)
    .execute(pool)
    .await
    .context("upsert shortcut binding")?;
    Ok(())
}

/// Bindings whose target is the given file. A target reachable through
/// several shortcuts yields one binding per shortcut.
pub async fn bindings_for_target(
    pool: &SqlitePool,
    target_file_id: &str,
) -> Result<Vec<ShortcutBinding>> {
    let rows = sqlx::query("SELECT * FROM shortcut_bindings WHERE target_file_id = ? ORDER BY id")
        .bind(target_file_id)
        .fetch_all(pool)
        .await
        .context("look up shortcut bindings for target")?;

    Ok(rows.iter().map(ShortcutBinding::from_row).collect())
}

pub async fn bindings_for_folder(
    pool: &SqlitePool,
    watched_folder_id: i64,
) -> Result<Vec<ShortcutBinding>> {
    let rows =
        sqlx::query("SELECT * FROM shortcut_bindings WHERE watched_folder_id = ? ORDER BY id")
            .bind(watched_folder_id)
            .fetch_all(pool)
            .await
            .context("list shortcut bindings for folder")?;

    Ok(rows.iter().map(ShortcutBinding::from_row).collect())
}
