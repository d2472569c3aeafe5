pub mod access;
pub mod classify;
pub mod date_filter;
pub mod extract;
pub mod hierarchy;
pub mod scheduler;
pub mod subscriptions;
pub mod worker;

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::drive_api::{Cursor, DriveApi, DriveFile};
use crate::store::access::Role;
use crate::store::folders::{self, WatchedFolder};
use crate::store::{entries, shortcuts, subscriptions as sub_store, sync_log};

use classify::Classify;
use date_filter::event_file_is_current;
use extract::{fetch_and_extract, ExtractText};
use hierarchy::{file_in_subtree, resolve_shortcut};

/// Counters and accumulated per-file errors from one sync pass.
#[derive(Debug, Default)]
pub struct PassOutcome {
    pub files_seen: i64,
    pub files_processed: i64,
    pub errors: Vec<String>,
}

/// Drives the three kinds of sync passes over the watched folders.
///
/// All collaborators are injected: the Drive surface, the classifier and the
/// text extractor are trait objects, so tests run the whole engine against
/// in-memory fakes.
pub struct SyncOrchestrator {
    pool: SqlitePool,
    api: Arc<dyn DriveApi>,
    classifier: Arc<dyn Classify>,
    extractor: Arc<dyn ExtractText>,
    root_folder_id: String,
    event_category: String,
    sync_user: String,
}

impl SyncOrchestrator {
    pub fn new(
        pool: SqlitePool,
        api: Arc<dyn DriveApi>,
        classifier: Arc<dyn Classify>,
        extractor: Arc<dyn ExtractText>,
        cfg: &Config,
    ) -> Self {
        Self {
            pool,
            api,
            classifier,
            extractor,
            root_folder_id: cfg.drive.root_folder_id.clone(),
            event_category: cfg.sync.event_category.clone(),
            sync_user: cfg.sync.sync_user.clone(),
        }
    }

    /// Timer-fired pass over one folder, registered by name on first use.
    pub async fn scheduled_sync(&self, folder_name: &str) -> Result<PassOutcome> {
        let folder = self.ensure_folder_by_name(folder_name).await?;
        self.run_folder_pass(&folder, "scheduled").await
    }

    /// Operator-triggered sweep over every top-level folder. Gated to roles
    /// trusted to start one; returns a human-readable summary.
    pub async fn on_demand_sync(&self, role: Role) -> Result<String> {
        if !role.can_trigger_sync() {
            bail!("role {role} may not trigger a sync");
        }

        let remote = self
            .api
            .list_folders(&self.root_folder_id)
            .await
            .context("list top-level folders")?;

        let mut folder_rows = Vec::new();
        for f in &remote {
            let id = folders::upsert_folder(
                &self.pool,
                &f.id,
                &f.name,
                Some(self.root_folder_id.as_str()),
            )
            .await?;
            if let Some(row) = folders::folder_by_id(&self.pool, id).await? {
                folder_rows.push(row);
            }
        }

        let mut total = PassOutcome::default();
        let mut folders_synced = 0usize;
        for folder in &folder_rows {
            match self.run_folder_pass(folder, "on_demand").await {
                Ok(outcome) => {
                    folders_synced += 1;
                    total.files_seen += outcome.files_seen;
                    total.files_processed += outcome.files_processed;
                    total.errors.extend(outcome.errors);
                }
                // One broken folder must not stop the sweep.
                Err(e) => {
                    warn!(folder = %folder.folder_name, error = %format!("{e:#}"), "folder sync failed");
                    total.errors.push(format!("{}: {e:#}", folder.folder_name));
                }
            }
        }

        let mut summary = format!(
            "synced {folders_synced}/{} folders: {} files found, {} processed",
            folder_rows.len(),
            total.files_seen,
            total.files_processed,
        );
        for err in total.errors.iter().take(3) {
            write!(summary, "\n  - {err}")?;
        }
        if total.errors.len() > 3 {
            write!(summary, "\n  ... and {} more errors", total.errors.len() - 3)?;
        }
        Ok(summary)
    }

    /// Push-notification pass: consume the change window behind a channel's
    /// cursor, keep only changes that resolve into the watched subtree, and
    /// advance the cursor once the window has been processed.
    pub async fn notification_sync(&self, channel_id: &str) -> Result<()> {
        let Some(sub) = sub_store::subscription_by_channel(&self.pool, channel_id).await? else {
            warn!(channel = %channel_id, "notification for unknown channel");
            return Ok(());
        };
        if !sub.active {
            debug!(channel = %channel_id, "notification for inactive channel");
            return Ok(());
        }

        let folder = self.ensure_folder_by_drive_id(&sub.drive_folder_id).await?;
        let cursor = Cursor::new(sub.page_token.clone());

        let (changes, next_cursor) = match self.api.list_changes(&cursor).await {
            Ok(window) => window,
            Err(e) if e.is_stale_cursor() => {
                // The token aged out of the feed. Take a fresh position and
                // rescan the folder so nothing in the gap is lost.
                warn!(channel = %channel_id, "stale cursor, rescanning folder");
                let fresh = self.api.start_page_token().await?;
                self.run_folder_pass(&folder, "notification").await?;
                sub_store::update_page_token(&self.pool, channel_id, fresh.as_str()).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mut work: Vec<(WatchedFolder, DriveFile)> = Vec::new();
        for change in changes {
            if change.removed.unwrap_or(false) {
                continue;
            }
            let Some(file) = change.file else { continue };
            if file.trashed.unwrap_or(false) || !file.kind().is_sync_candidate() {
                continue;
            }

            if file.parents.iter().any(|p| p == &folder.drive_folder_id) {
                work.push((folder.clone(), file));
                continue;
            }

            // A change on a shortcut target belongs to whichever watched
            // folder holds the shortcut.
            let bindings = shortcuts::bindings_for_target(&self.pool, &file.id).await?;
            if !bindings.is_empty() {
                for binding in bindings {
                    if let Some(owner) =
                        folders::folder_by_id(&self.pool, binding.watched_folder_id).await?
                    {
                        work.push((owner, file.clone()));
                    }
                }
                continue;
            }

            if file_in_subtree(self.api.as_ref(), &file, &folder.drive_folder_id).await? {
                work.push((folder.clone(), file));
            }
        }

        let today = Local::now().date_naive();
        let day = today.format("%Y-%m-%d").to_string();
        let mut outcome = PassOutcome::default();
        for (owner, file) in work {
            outcome.files_seen += 1;
            match self.process_one(&owner, &file, today, &day).await {
                Ok(true) => outcome.files_processed += 1,
                Ok(false) => {}
                Err(e) => outcome.errors.push(format!("{}: {e:#}", file.name)),
            }
        }

        self.finish_pass(&folder, &day, &outcome, "notification").await?;
        // Cursor moves only after the window is in the store, so a crash
        // mid-pass re-delivers rather than skips. The upsert key absorbs
        // the duplicates.
        sub_store::update_page_token(&self.pool, channel_id, next_cursor.as_str()).await?;

        info!(
            folder = %folder.folder_name,
            seen = outcome.files_seen,
            processed = outcome.files_processed,
            "notification pass complete"
        );
        Ok(())
    }

    /// Full listing pass over one folder's direct children.
    pub async fn run_folder_pass(
        &self,
        folder: &WatchedFolder,
        trigger: &str,
    ) -> Result<PassOutcome> {
        let children = self
            .api
            .list_children(&folder.drive_folder_id)
            .await
            .with_context(|| format!("list children of {}", folder.folder_name))?;

        let today = Local::now().date_naive();
        let day = today.format("%Y-%m-%d").to_string();
        let mut outcome = PassOutcome::default();

        for child in children {
            if child.is_folder() {
                continue;
            }

            let target = if child.is_shortcut() {
                match resolve_shortcut(self.api.as_ref(), &self.pool, &child, folder.id).await {
                    Ok(Some(target)) => target,
                    Ok(None) => continue,
                    Err(e) => {
                        outcome.errors.push(format!("{}: {e:#}", child.name));
                        continue;
                    }
                }
            } else {
                child
            };

            outcome.files_seen += 1;
            match self.process_one(folder, &target, today, &day).await {
                Ok(true) => outcome.files_processed += 1,
                Ok(false) => {}
                Err(e) => outcome.errors.push(format!("{}: {e:#}", target.name)),
            }
        }

        self.finish_pass(folder, &day, &outcome, trigger).await?;
        info!(
            folder = %folder.folder_name,
            trigger,
            seen = outcome.files_seen,
            processed = outcome.files_processed,
            errors = outcome.errors.len(),
            "folder pass complete"
        );
        Ok(outcome)
    }

    /// Classify, gate, extract and upsert one file.
    ///
    /// `Ok(false)` means the file was deliberately skipped (wrong-day event
    /// file, or content the extractor cannot read).
    async fn process_one(
        &self,
        folder: &WatchedFolder,
        file: &DriveFile,
        today: NaiveDate,
        day: &str,
    ) -> Result<bool> {
        let tag = self.classifier.classify(&folder.folder_name, &file.name);

        if tag.as_str() == self.event_category && !event_file_is_current(&file.name, today) {
            debug!(file = %file.name, "event file not dated today, skipping");
            return Ok(false);
        }

        let Some(text) =
            fetch_and_extract(self.api.as_ref(), self.extractor.as_ref(), file, tag).await?
        else {
            debug!(file = %file.name, "no extractable text, skipping");
            return Ok(false);
        };

        entries::upsert_file_entry(
            &self.pool,
            day,
            tag.as_str(),
            &file.id,
            &file.name,
            &text,
            &self.sync_user,
            Some(folder.id),
        )
        .await?;
        Ok(true)
    }

    async fn finish_pass(
        &self,
        folder: &WatchedFolder,
        day: &str,
        outcome: &PassOutcome,
        trigger: &str,
    ) -> Result<()> {
        let errors = if outcome.errors.is_empty() {
            None
        } else {
            Some(outcome.errors.join("; "))
        };
        sync_log::append(
            &self.pool,
            Some(folder.id),
            day,
            outcome.files_seen,
            outcome.files_processed,
            errors.as_deref(),
            trigger,
        )
        .await?;
        folders::touch_last_synced(&self.pool, folder.id).await
    }

    async fn ensure_folder_by_name(&self, name: &str) -> Result<WatchedFolder> {
        if let Some(folder) = folders::folder_by_name(&self.pool, name).await? {
            return Ok(folder);
        }

        let Some(remote) = self
            .api
            .find_folder_by_name(name, &self.root_folder_id)
            .await?
        else {
            bail!("folder not found in store or drive: {name}");
        };

        let id = folders::upsert_folder(
            &self.pool,
            &remote.id,
            &remote.name,
            Some(self.root_folder_id.as_str()),
        )
        .await?;
        folders::folder_by_id(&self.pool, id)
            .await?
            .context("folder row vanished after upsert")
    }

    async fn ensure_folder_by_drive_id(&self, drive_folder_id: &str) -> Result<WatchedFolder> {
        if let Some(folder) = folders::folder_by_drive_id(&self.pool, drive_folder_id).await? {
            return Ok(folder);
        }

        let meta = self.api.file_metadata(drive_folder_id).await?;
        let id = folders::upsert_folder(
            &self.pool,
            &meta.id,
            &meta.name,
            meta.parents.first().map(String::as_str),
        )
        .await?;
        folders::folder_by_id(&self.pool, id)
            .await?
            .context("folder row vanished after upsert")
    }
}
