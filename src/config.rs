use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub auth: AuthConfig,
    pub drive: DriveConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    /// Time-of-day schedule: one entry per folder that gets a daily pass.
    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Custom path for token storage
    pub token_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriveConfig {
    /// The shared Drive root under which all watched folders live.
    pub root_folder_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    /// Database file location [default: $XDG_DATA_HOME/drivesyncd/knowledge.db]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Publicly reachable URL Drive should push notifications to.
    pub callback_url: Option<String>,
    /// Shared secret carried as the channel token and verified on POSTs.
    pub secret: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            callback_url: None,
            secret: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Category whose folders get the filename-date gate (stale-flyer filter).
    #[serde(default = "default_event_category")]
    pub event_category: String,
    /// Attribution recorded on synced entries.
    #[serde(default = "default_sync_user")]
    pub sync_user: String,
    #[serde(default = "default_renewal_sweep_secs")]
    pub renewal_sweep_secs: u64,
    #[serde(default = "default_notification_workers")]
    pub notification_workers: usize,
    #[serde(default = "default_notification_queue_depth")]
    pub notification_queue_depth: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            event_category: default_event_category(),
            sync_user: default_sync_user(),
            renewal_sweep_secs: default_renewal_sweep_secs(),
            notification_workers: default_notification_workers(),
            notification_queue_depth: default_notification_queue_depth(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractorConfig {
    /// External text-extraction service for PDFs and images. Without it,
    /// those files are reported as per-file errors during sync.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleEntry {
    pub folder: String,
    pub hour: u32,
    pub minute: u32,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8088".into()
}
fn default_event_category() -> String {
    "EVENT".into()
}
fn default_sync_user() -> String {
    "drive-sync".into()
}
fn default_renewal_sweep_secs() -> u64 {
    3600
}
fn default_notification_workers() -> usize {
    2
}
fn default_notification_queue_depth() -> usize {
    64
}

pub fn default_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(dir.join("drivesyncd").join("config.toml"))
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    let content = std::fs::read_to_string(&path).with_context(|| {
        format!(
            "Failed to read config file: {}\n\
             Create it with your Drive OAuth credentials and root folder id.",
            path.display()
        )
    })?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    if config.auth.client_id.is_empty() {
        anyhow::bail!("auth.client_id must not be empty");
    }
    if config.auth.client_secret.is_empty() {
        anyhow::bail!("auth.client_secret must not be empty");
    }
    if config.drive.root_folder_id.is_empty() {
        anyhow::bail!("drive.root_folder_id must not be empty");
    }
    for entry in &config.schedule {
        if entry.hour > 23 || entry.minute > 59 {
            anyhow::bail!(
                "schedule entry for '{}' has an invalid time {:02}:{:02}",
                entry.folder,
                entry.hour,
                entry.minute
            );
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let cfg: Config = toml::from_str(
            r#"
            [auth]
            client_id = "cid"
            client_secret = "cs"

            [drive]
            root_folder_id = "root123"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.drive.root_folder_id, "root123");
        assert_eq!(cfg.sync.event_category, "EVENT");
        assert_eq!(cfg.webhook.bind_addr, "0.0.0.0:8088");
        assert!(cfg.database.path.is_none());
        assert!(cfg.schedule.is_empty());
    }

    #[test]
    fn parses_schedule_entries() {
        let cfg: Config = toml::from_str(
            r#"
            [auth]
            client_id = "cid"
            client_secret = "cs"

            [drive]
            root_folder_id = "root123"

            [database]
            path = "/var/lib/drivesyncd/knowledge.db"

            [[schedule]]
            folder = "Relief Committee"
            hour = 6
            minute = 30

            [[schedule]]
            folder = "Bulletins"
            hour = 7
            minute = 0
            "#,
        )
        .unwrap();

        assert_eq!(cfg.schedule.len(), 2);
        assert_eq!(cfg.schedule[0].folder, "Relief Committee");
        assert_eq!(cfg.schedule[0].hour, 6);
        assert_eq!(
            cfg.database.path.as_deref(),
            Some(Path::new("/var/lib/drivesyncd/knowledge.db"))
        );
    }
}
