pub mod access;
pub mod entries;
pub mod folders;
pub mod shortcuts;
pub mod subscriptions;
pub mod sync_log;

/// Today's date in the local timezone, formatted as the `day` column value.
pub fn today() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}
