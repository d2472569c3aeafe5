use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::SyncOrchestrator;

/// A webhook delivery waiting for its background pass.
#[derive(Debug)]
pub struct Notification {
    pub channel_id: String,
}

/// Bounded handoff between the webhook handler and the sync workers.
///
/// The HTTP side must answer within seconds, so the handler only enqueues.
/// When the queue is full the notification is dropped with a warning; the
/// cursor model makes the next delivery for the same channel pick up the
/// dropped window anyway.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<Notification>,
}

impl NotificationQueue {
    pub fn new(depth: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(depth);
        (Self { tx }, rx)
    }

    pub fn enqueue(&self, channel_id: &str) -> bool {
        let note = Notification {
            channel_id: channel_id.to_string(),
        };
        match self.tx.try_send(note) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(n)) => {
                warn!(channel = %n.channel_id, "notification queue full, dropping");
                false
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                warn!(channel = %n.channel_id, "notification queue closed, dropping");
                false
            }
        }
    }
}

/// Start a fixed pool of workers draining the queue until cancelled.
pub fn spawn_workers(
    count: usize,
    rx: mpsc::Receiver<Notification>,
    orchestrator: Arc<SyncOrchestrator>,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let rx = Arc::new(Mutex::new(rx));
    (0..count)
        .map(|worker| {
            let rx = rx.clone();
            let orchestrator = orchestrator.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    let note = {
                        let mut rx = rx.lock().await;
                        tokio::select! {
                            _ = cancel.cancelled() => None,
                            note = rx.recv() => note,
                        }
                    };
                    let Some(note) = note else {
                        debug!(worker, "notification worker stopping");
                        return;
                    };

                    debug!(worker, channel = %note.channel_id, "notification pass starting");
                    if let Err(e) = orchestrator.notification_sync(&note.channel_id).await {
                        // Dropped, not retried: the next delivery on this
                        // channel replays the same cursor window.
                        warn!(
                            worker,
                            channel = %note.channel_id,
                            error = %format!("{e:#}"),
                            "notification pass failed"
                        );
                    }
                }
            })
        })
        .collect()
}
