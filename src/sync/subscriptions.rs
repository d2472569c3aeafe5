use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::drive_api::DriveApi;
use crate::store::subscriptions as sub_store;

/// Subscriptions expiring within this window get renewed by the sweep.
const RENEWAL_WINDOW: chrono::Duration = chrono::Duration::hours(24);

/// Channel lifetime to assume when the store does not report one.
const DEFAULT_CHANNEL_TTL: chrono::Duration = chrono::Duration::days(7);

/// Owns the push-notification channel lifecycle: registration, renewal
/// ahead of expiry, and retirement of dead channels.
pub struct SubscriptionManager {
    pool: SqlitePool,
    api: Arc<dyn DriveApi>,
    callback_url: String,
    secret: Option<String>,
}

impl SubscriptionManager {
    pub fn new(
        pool: SqlitePool,
        api: Arc<dyn DriveApi>,
        callback_url: String,
        secret: Option<String>,
    ) -> Self {
        Self {
            pool,
            api,
            callback_url,
            secret,
        }
    }

    /// Register a fresh channel watching a folder. The change-feed cursor is
    /// captured first so the subscription never misses changes made between
    /// registration and the first notification.
    pub async fn register(&self, drive_folder_id: &str) -> Result<String> {
        let cursor = self
            .api
            .start_page_token()
            .await
            .context("capture start page token")?;
        let channel_id = Uuid::new_v4().to_string();

        let channel = self
            .api
            .watch_folder(
                drive_folder_id,
                &channel_id,
                &self.callback_url,
                self.secret.as_deref(),
            )
            .await
            .with_context(|| format!("watch folder {drive_folder_id}"))?;

        let expires_at = channel
            .expires_at()
            .unwrap_or_else(|| Utc::now() + DEFAULT_CHANNEL_TTL);

        sub_store::insert_subscription(
            &self.pool,
            &channel.id,
            &channel.resource_id,
            drive_folder_id,
            &self.callback_url,
            cursor.as_str(),
            expires_at,
        )
        .await?;

        info!(folder = %drive_folder_id, channel = %channel.id, %expires_at, "subscribed");
        Ok(channel.id)
    }

    /// Register a channel only if the folder has no active one.
    pub async fn ensure_subscribed(&self, drive_folder_id: &str) -> Result<()> {
        let active = sub_store::active_for_folder(&self.pool, drive_folder_id).await?;
        if active.is_empty() {
            self.register(drive_folder_id).await?;
        }
        Ok(())
    }

    /// Re-arm a folder that lost its channel, looked up by its configured
    /// name. Called after each scheduled pass so a folder never stays
    /// unwatched past its next timer.
    pub async fn rearm_folder_by_name(&self, name: &str) -> Result<()> {
        if let Some(folder) = crate::store::folders::folder_by_name(&self.pool, name).await? {
            self.ensure_subscribed(&folder.drive_folder_id).await?;
        }
        Ok(())
    }

    /// Renew every active subscription expiring within the renewal window.
    ///
    /// A renewal opens the new channel with the old channel's cursor, so no
    /// part of the change feed is skipped across the handover. The old
    /// channel is stopped best-effort and its row flipped inactive. When
    /// opening the new channel fails the old row stays active; the next
    /// sweep retries.
    pub async fn renew_expiring(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut renewed = 0;
        for sub in sub_store::all_active(&self.pool).await? {
            let expires = match sub.expires_at_utc() {
                Ok(at) => at,
                Err(e) => {
                    warn!(channel = %sub.channel_id, error = %e, "unreadable expiry, deactivating");
                    sub_store::deactivate(&self.pool, &sub.channel_id).await?;
                    continue;
                }
            };
            if expires > now + RENEWAL_WINDOW {
                continue;
            }

            let new_channel_id = Uuid::new_v4().to_string();
            let channel = match self
                .api
                .watch_folder(
                    &sub.drive_folder_id,
                    &new_channel_id,
                    &sub.callback_url,
                    self.secret.as_deref(),
                )
                .await
            {
                Ok(ch) => ch,
                Err(e) => {
                    warn!(channel = %sub.channel_id, error = %e, "renewal failed, keeping old channel");
                    continue;
                }
            };

            let expires_at = channel
                .expires_at()
                .unwrap_or_else(|| now + DEFAULT_CHANNEL_TTL);
            sub_store::insert_subscription(
                &self.pool,
                &channel.id,
                &channel.resource_id,
                &sub.drive_folder_id,
                &sub.callback_url,
                &sub.page_token,
                expires_at,
            )
            .await?;
            sub_store::deactivate(&self.pool, &sub.channel_id).await?;

            if let Err(e) = self.api.stop_channel(&sub.channel_id, &sub.resource_id).await {
                debug!(channel = %sub.channel_id, error = %e, "old channel stop failed");
            }

            info!(
                folder = %sub.drive_folder_id,
                old = %sub.channel_id,
                new = %channel.id,
                "subscription renewed"
            );
            renewed += 1;
        }
        Ok(renewed)
    }

    /// Flip rows whose expiry has already passed to inactive. The store has
    /// stopped delivering on them, so there is nothing to stop remotely.
    pub async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut retired = 0;
        for sub in sub_store::all_active(&self.pool).await? {
            let expired = match sub.expires_at_utc() {
                Ok(at) => at <= now,
                Err(_) => true,
            };
            if expired {
                sub_store::deactivate(&self.pool, &sub.channel_id).await?;
                info!(channel = %sub.channel_id, "expired subscription retired");
                retired += 1;
            }
        }
        Ok(retired)
    }

    /// Periodic maintenance loop until cancelled.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("subscription sweeper stopping");
                    return;
                }
                _ = ticker.tick() => {
                    let now = Utc::now();
                    if let Err(e) = self.deactivate_expired(now).await {
                        warn!(error = %format!("{e:#}"), "expiry sweep failed");
                    }
                    match self.renew_expiring(now).await {
                        Ok(0) => {}
                        Ok(n) => info!(renewed = n, "renewal sweep complete"),
                        Err(e) => warn!(error = %format!("{e:#}"), "renewal sweep failed"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    use crate::db::init_test_db;
    use crate::testutil::FakeDrive;

    async fn manager() -> (SqlitePool, Arc<FakeDrive>, SubscriptionManager) {
        let pool = init_test_db().await;
        let drive = Arc::new(FakeDrive::new());
        let mgr = SubscriptionManager::new(
            pool.clone(),
            drive.clone() as Arc<dyn DriveApi>,
            "https://example.test/webhook/drive".into(),
            None,
        );
        (pool, drive, mgr)
    }

    #[tokio::test]
    async fn register_stores_an_active_row_with_the_current_cursor() {
        let (pool, drive, mgr) = manager().await;
        drive.set_channel_ttl_millis(7 * 24 * 3600 * 1000);

        let channel = mgr.register("f-relief").await.unwrap();

        let sub = sub_store::subscription_by_channel(&pool, &channel)
            .await
            .unwrap()
            .unwrap();
        assert!(sub.active);
        assert_eq!(sub.drive_folder_id, "f-relief");
        assert_eq!(sub.page_token, "0");
        assert!(sub.expires_at_utc().unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn ensure_subscribed_is_idempotent() {
        let (pool, drive, mgr) = manager().await;

        mgr.ensure_subscribed("f-relief").await.unwrap();
        mgr.ensure_subscribed("f-relief").await.unwrap();

        assert_eq!(drive.watch_count(), 1);
        let active = sub_store::active_for_folder(&pool, "f-relief").await.unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn expiring_subscriptions_are_renewed_with_the_same_cursor() {
        let (pool, drive, mgr) = manager().await;
        let now = Utc::now();
        sub_store::insert_subscription(
            &pool,
            "ch-old",
            "res-old",
            "f-relief",
            "https://example.test/webhook/drive",
            "42",
            now + ChronoDuration::hours(2),
        )
        .await
        .unwrap();

        let renewed = mgr.renew_expiring(now).await.unwrap();
        assert_eq!(renewed, 1);

        let old = sub_store::subscription_by_channel(&pool, "ch-old")
            .await
            .unwrap()
            .unwrap();
        assert!(!old.active);
        assert_eq!(drive.stopped_channels(), vec!["ch-old".to_string()]);

        let active = sub_store::active_for_folder(&pool, "f-relief").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_ne!(active[0].channel_id, "ch-old");
        assert_eq!(active[0].page_token, "42");
        assert!(active[0].expires_at_utc().unwrap() > now + RENEWAL_WINDOW);
    }

    #[tokio::test]
    async fn renewal_failure_keeps_the_old_channel_active() {
        let (pool, drive, mgr) = manager().await;
        let now = Utc::now();
        sub_store::insert_subscription(
            &pool,
            "ch-old",
            "res-old",
            "f-relief",
            "https://example.test/webhook/drive",
            "42",
            now + ChronoDuration::hours(2),
        )
        .await
        .unwrap();
        drive.set_fail_watch(true);

        let renewed = mgr.renew_expiring(now).await.unwrap();
        assert_eq!(renewed, 0);

        let old = sub_store::subscription_by_channel(&pool, "ch-old")
            .await
            .unwrap()
            .unwrap();
        assert!(old.active);
    }

    #[tokio::test]
    async fn healthy_subscriptions_are_left_alone() {
        let (pool, _drive, mgr) = manager().await;
        let now = Utc::now();
        sub_store::insert_subscription(
            &pool,
            "ch-1",
            "res-1",
            "f-relief",
            "https://example.test/webhook/drive",
            "7",
            now + ChronoDuration::days(5),
        )
        .await
        .unwrap();

        assert_eq!(mgr.renew_expiring(now).await.unwrap(), 0);
        assert_eq!(mgr.deactivate_expired(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn expired_rows_are_retired() {
        let (pool, _drive, mgr) = manager().await;
        let now = Utc::now();
        sub_store::insert_subscription(
            &pool,
            "ch-dead",
            "res-1",
            "f-relief",
            "https://example.test/webhook/drive",
            "7",
            now - ChronoDuration::hours(1),
        )
        .await
        .unwrap();

        assert_eq!(mgr.deactivate_expired(now).await.unwrap(), 1);
        let sub = sub_store::subscription_by_channel(&pool, "ch-dead")
            .await
            .unwrap()
            .unwrap();
        assert!(!sub.active);
    }
}
