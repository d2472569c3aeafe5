use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use tracing::{debug, warn};

use crate::sync::worker::NotificationQueue;

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct WebhookState {
    pub queue: NotificationQueue,
    pub secret: Option<String>,
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook/drive", get(challenge).post(notify))
        .with_state(state)
}

/// Endpoint-verification probe: echo the challenge back if one is given.
async fn challenge(Query(params): Query<HashMap<String, String>>) -> String {
    params.get("challenge").cloned().unwrap_or_default()
}

/// Push notification intake. All the payload lives in headers; the handler
/// only validates and enqueues, and always answers 200 so the store never
/// marks the endpoint unhealthy over processing hiccups.
async fn notify(State(state): State<WebhookState>, headers: HeaderMap) -> StatusCode {
    let channel_id = header_str(&headers, "x-goog-channel-id");
    let resource_state = header_str(&headers, "x-goog-resource-state");
    let token = header_str(&headers, "x-goog-channel-token");

    if let Some(secret) = &state.secret {
        if token != Some(secret.as_str()) {
            warn!(channel = channel_id.unwrap_or("?"), "channel token mismatch, dropping");
            return StatusCode::OK;
        }
    }

    match (resource_state, channel_id) {
        (Some("sync"), channel) => {
            debug!(channel = channel.unwrap_or("?"), "channel handshake");
        }
        (Some("update" | "change"), Some(channel)) => {
            state.queue.enqueue(channel);
        }
        (Some("trash"), channel) => {
            debug!(channel = channel.unwrap_or("?"), "trash notification ignored");
        }
        (state_kind, _) => {
            debug!(state = state_kind.unwrap_or("?"), "unrecognized notification");
        }
    }

    StatusCode::OK
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(entries: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in entries {
            map.insert(
                axum::http::HeaderName::try_from(*name).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    fn state_with(depth: usize, secret: Option<&str>) -> (WebhookState, tokio::sync::mpsc::Receiver<crate::sync::worker::Notification>) {
        let (queue, rx) = NotificationQueue::new(depth);
        (
            WebhookState {
                queue,
                secret: secret.map(str::to_string),
            },
            rx,
        )
    }

    #[tokio::test]
    async fn challenge_is_echoed() {
        let mut params = HashMap::new();
        params.insert("challenge".to_string(), "abc123".to_string());
        assert_eq!(challenge(Query(params)).await, "abc123");
        assert_eq!(challenge(Query(HashMap::new())).await, "");
    }

    #[tokio::test]
    async fn update_notifications_are_enqueued() {
        let (state, mut rx) = state_with(4, None);
        let status = notify(
            State(state),
            headers(&[
                ("x-goog-channel-id", "ch-1"),
                ("x-goog-resource-id", "res-1"),
                ("x-goog-resource-state", "update"),
            ]),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(rx.try_recv().unwrap().channel_id, "ch-1");
    }

    #[tokio::test]
    async fn sync_handshake_is_acked_without_work() {
        let (state, mut rx) = state_with(4, None);
        let status = notify(
            State(state),
            headers(&[
                ("x-goog-channel-id", "ch-1"),
                ("x-goog-resource-state", "sync"),
            ]),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn token_mismatch_is_dropped_but_still_200() {
        let (state, mut rx) = state_with(4, Some("s3cret"));
        let status = notify(
            State(state),
            headers(&[
                ("x-goog-channel-id", "ch-1"),
                ("x-goog-resource-state", "update"),
                ("x-goog-channel-token", "wrong"),
            ]),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn matching_token_passes() {
        let (state, mut rx) = state_with(4, Some("s3cret"));
        notify(
            State(state),
            headers(&[
                ("x-goog-channel-id", "ch-1"),
                ("x-goog-resource-state", "change"),
                ("x-goog-channel-token", "s3cret"),
            ]),
        )
        .await;

        assert_eq!(rx.try_recv().unwrap().channel_id, "ch-1");
    }
}
