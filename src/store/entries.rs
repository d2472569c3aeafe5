use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

/// One classified piece of knowledge for one day.
#[derive(Debug, Clone)]
pub struct DailyEntry {
    pub id: i64,
    pub day: String,
    pub tag: String,
    pub source_file_id: Option<String>,
    pub file_name: Option<String>,
    pub content: String,
    pub uploaded_by: String,
    pub folder_id: Option<i64>,
    pub created_at: String,
}

impl DailyEntry {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            day: row.get("day"),
            tag: row.get("tag"),
            source_file_id: row.get("source_file_id"),
            file_name: row.get("file_name"),
            content: row.get("content"),
            uploaded_by: row.get("uploaded_by"),
            folder_id: row.get("folder_id"),
            created_at: row.get("created_at"),
        }
    }
}

/// Entry content extracted from a Drive file, keyed on (day, source file).
/// Re-running a pass over the same file replaces the previous row instead
/// of accumulating duplicates.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_file_entry(
    pool: &SqlitePool,
    day: &str,
    tag: &str,
    source_file_id: &str,
    file_name: &str,
    content: &str,
    uploaded_by: &str,
    folder_id: Option<i64>,
) -> Result<i64> {
    let row = sqlx::query(
        r#"
        INSERT INTO daily_entries
            (day, tag, source_file_id, file_name, content, uploaded_by, folder_id)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(day, source_file_id) WHERE source_file_id IS NOT NULL DO UPDATE SET
            tag = excluded.tag,
            file_name = excluded.file_name,
            content = excluded.content,
            uploaded_by = excluded.uploaded_by,
            folder_id = excluded.folder_id
        RETURNING id
        "#,
    )
    .bind(day)
    .bind(tag)
    .bind(source_file_id)
    .bind(file_name)
    .bind(content)
    .bind(uploaded_by)
    .bind(folder_id)
    .fetch_one(pool)
    .await
    .context("upsert daily entry")?;

    Ok(row.get("id"))
}

/// Entry with no backing Drive file (e.g. typed in by an operator).
/// Always inserts a fresh row.
pub async fn insert_manual_entry(
    pool: &SqlitePool,
    day: &str,
    tag: &str,
    content: &str,
    uploaded_by: &str,
) -> Result<i64> {
    let row = sqlx::query(
        r#"
        INSERT INTO daily_entries (day, tag, content, uploaded_by)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(day)
    .bind(tag)
    .bind(content)
    .bind(uploaded_by)
    .fetch_one(pool)
    .await
    .context("insert manual entry")?;

    Ok(row.get("id"))
}

pub async fn entries_for_day(pool: &SqlitePool, day: &str) -> Result<Vec<DailyEntry>> {
    let rows = sqlx::query("SELECT * FROM daily_entries WHERE day = ? ORDER BY created_at, id")
        .bind(day)
        .fetch_all(pool)
        .await
        .context("list entries for day")?;

    Ok(rows.iter().map(DailyEntry::from_row).collect())
}

pub async fn entries_for_day_tag(
    pool: &SqlitePool,
    day: &str,
    tag: &str,
) -> Result<Vec<DailyEntry>> {
    let rows = sqlx::query(
        "SELECT * FROM daily_entries WHERE day = ? AND tag = ? ORDER BY created_at, id",
    )
    .bind(day)
    .bind(tag)
    .fetch_all(pool)
    .await
    .context("list entries for day and tag")?;

    Ok(rows.iter().map(DailyEntry::from_row).collect())
}

pub async fn entry_count_for_day(pool: &SqlitePool, day: &str) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM daily_entries WHERE day = ?")
        .bind(day)
        .fetch_one(pool)
        .await
        .context("count entries for day")?;
    Ok(row.get("n"))
}
