use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, TimeDelta};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ScheduleEntry;

use super::subscriptions::SubscriptionManager;
use super::SyncOrchestrator;

/// Fire each configured folder sync at its local time of day, every day,
/// until cancelled.
pub async fn run_scheduler(
    entries: Vec<ScheduleEntry>,
    orchestrator: Arc<SyncOrchestrator>,
    subscriptions: Option<Arc<SubscriptionManager>>,
    cancel: CancellationToken,
) {
    if entries.is_empty() {
        info!("no sync schedule configured");
        return;
    }

    loop {
        let now = Local::now();
        let Some((folders, at)) = next_firing(&entries, now) else {
            warn!("schedule contains no valid entries");
            return;
        };
        let wait = (at - now).to_std().unwrap_or(Duration::ZERO);
        info!(folders = ?folders, at = %at.format("%H:%M"), "next scheduled sync");

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(wait) => {}
        }

        for folder in &folders {
            match orchestrator.scheduled_sync(folder).await {
                Ok(outcome) => {
                    info!(
                        folder = %folder,
                        seen = outcome.files_seen,
                        processed = outcome.files_processed,
                        "scheduled sync complete"
                    );
                    if let Some(subs) = &subscriptions {
                        if let Err(e) = subs.rearm_folder_by_name(folder).await {
                            warn!(folder = %folder, error = %format!("{e:#}"), "re-arm failed");
                        }
                    }
                }
                Err(e) => {
                    warn!(folder = %folder, error = %format!("{e:#}"), "scheduled sync failed")
                }
            }
        }
    }
}

/// All folders due at the soonest upcoming instant. Entries sharing a time
/// of day fire together in one iteration, so none of them rolls to the next
/// day once the shared slot has been consumed.
fn next_firing(
    entries: &[ScheduleEntry],
    now: DateTime<Local>,
) -> Option<(Vec<String>, DateTime<Local>)> {
    let upcoming: Vec<(String, DateTime<Local>)> = entries
        .iter()
        .filter_map(|entry| {
            let time = NaiveTime::from_hms_opt(entry.hour, entry.minute, 0)?;
            let today = now.date_naive().and_time(time);
            let mut at = today.and_local_timezone(Local).single()?;
            if at <= now {
                at += TimeDelta::days(1);
            }
            Some((entry.folder.clone(), at))
        })
        .collect();

    let at = upcoming.iter().map(|(_, at)| *at).min()?;
    let folders = upcoming
        .into_iter()
        .filter(|(_, t)| *t == at)
        .map(|(folder, _)| folder)
        .collect();
    Some((folders, at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(folder: &str, hour: u32, minute: u32) -> ScheduleEntry {
        ScheduleEntry {
            folder: folder.to_string(),
            hour,
            minute,
        }
    }

    #[test]
    fn picks_the_soonest_entry_today() {
        let now = Local.with_ymd_and_hms(2025, 3, 5, 6, 0, 0).unwrap();
        let entries = vec![entry("Relief", 7, 0), entry("Bulletin", 12, 30)];

        let (folders, at) = next_firing(&entries, now).unwrap();
        assert_eq!(folders, vec!["Relief"]);
        assert_eq!(at.format("%Y-%m-%d %H:%M").to_string(), "2025-03-05 07:00");
    }

    #[test]
    fn past_times_roll_to_tomorrow() {
        let now = Local.with_ymd_and_hms(2025, 3, 5, 13, 0, 0).unwrap();
        let entries = vec![entry("Relief", 7, 0)];

        let (_, at) = next_firing(&entries, now).unwrap();
        assert_eq!(at.format("%Y-%m-%d %H:%M").to_string(), "2025-03-06 07:00");
    }

    #[test]
    fn same_time_folders_share_one_slot() {
        let now = Local.with_ymd_and_hms(2025, 3, 5, 6, 0, 0).unwrap();
        let entries = vec![entry("Relief", 7, 0), entry("Bulletin", 7, 0)];

        let (folders, at) = next_firing(&entries, now).unwrap();
        assert_eq!(folders, vec!["Relief", "Bulletin"]);
        assert_eq!(at.format("%Y-%m-%d %H:%M").to_string(), "2025-03-05 07:00");
    }

    #[test]
    fn consuming_a_shared_slot_starves_neither_folder() {
        // Just after the shared slot fired: both entries move to tomorrow
        // together instead of one losing its daily pass.
        let now = Local.with_ymd_and_hms(2025, 3, 5, 7, 0, 5).unwrap();
        let entries = vec![entry("Relief", 7, 0), entry("Bulletin", 7, 0)];

        let (folders, at) = next_firing(&entries, now).unwrap();
        assert_eq!(folders, vec!["Relief", "Bulletin"]);
        assert_eq!(at.format("%Y-%m-%d %H:%M").to_string(), "2025-03-06 07:00");
    }
}
