use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};

use crate::auth::TokenManager;
use crate::error::DriveError;

use super::types::DriveApiErrorBody;

const API_BASE: &str = "https://www.googleapis.com/drive/v3";

pub struct DriveClient {
    http: reqwest::Client,
    token_manager: Arc<TokenManager>,
}

impl DriveClient {
    pub fn new(token_manager: Arc<TokenManager>) -> Self {
        // Explicit timeouts so a stalled Drive call cannot wedge a sync pass.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            token_manager,
        }
    }

    /// Build an authenticated request against the Drive v3 API.
    pub fn api_request(&self, method: Method, path: &str) -> AuthenticatedRequest<'_> {
        let url = format!("{API_BASE}{path}");
        AuthenticatedRequest {
            client: self,
            builder: self.http.request(method, &url),
        }
    }
}

/// Helper that attaches the bearer token and sends with retry logic.
pub struct AuthenticatedRequest<'a> {
    client: &'a DriveClient,
    builder: RequestBuilder,
}

impl<'a> AuthenticatedRequest<'a> {
    pub fn query(mut self, params: &[(&str, &str)]) -> Self {
        self.builder = self.builder.query(params);
        self
    }

    pub fn json<T: serde::Serialize + ?Sized>(mut self, body: &T) -> Self {
        self.builder = self.builder.json(body);
        self
    }

    /// Send the request with automatic auth and retry on rate-limit (429).
    pub async fn send(self) -> Result<Response, DriveError> {
        const MAX_RETRIES: u32 = 5;
        let mut builder = self.builder;

        for attempt in 0..=MAX_RETRIES {
            let token = self
                .client
                .token_manager
                .get_access_token()
                .await
                .map_err(|e| DriveError::Authorization(format!("{e:#}")))?;
            let retry_builder = builder.try_clone();

            let resp = builder
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| DriveError::Transient(format!("HTTP request failed: {e}")))?;

            match resp.status() {
                s if s.is_success() => return Ok(resp),

                StatusCode::TOO_MANY_REQUESTS if attempt < MAX_RETRIES => {
                    let retry_after = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(2);
                    let wait = Duration::from_secs(retry_after) + jitter();
                    tracing::warn!(
                        retry_after,
                        attempt = attempt + 1,
                        "rate limited, waiting {wait:?}"
                    );
                    tokio::time::sleep(wait).await;

                    match retry_builder {
                        Some(b) => {
                            builder = b;
                            continue;
                        }
                        None => {
                            return Err(DriveError::Transient(
                                "rate limited — cannot retry request with streamed body".into(),
                            ))
                        }
                    }
                }

                StatusCode::TOO_MANY_REQUESTS => {
                    return Err(DriveError::Transient(format!(
                        "rate limited — exhausted {MAX_RETRIES} retries"
                    )));
                }

                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(DriveError::Authorization(error_detail(resp).await));
                }

                StatusCode::NOT_FOUND => {
                    return Err(DriveError::NotFound(error_detail(resp).await));
                }

                s if s.is_server_error() => {
                    return Err(DriveError::Transient(error_detail(resp).await));
                }

                _ => {
                    return Err(DriveError::Protocol(error_detail(resp).await));
                }
            }
        }

        unreachable!()
    }
}

/// Pull the structured Drive error message out of a failed response.
async fn error_detail(resp: Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<DriveApiErrorBody>(&body) {
        Ok(err) => err.error.to_string(),
        Err(_) => format!("HTTP {status}: {body}"),
    }
}

fn jitter() -> Duration {
    let ms: u64 = rand::random::<u64>() % 1000;
    Duration::from_millis(ms)
}
