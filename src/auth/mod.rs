mod token_store;

use std::path::PathBuf;

use token_store::TokenData;

use anyhow::{Context, Result};
use tokio::sync::Mutex;

use crate::config::Config;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Caches the OAuth access token and refreshes it through the Google token
/// endpoint when it nears expiry. The token file must be seeded with a
/// refresh token (Google issues one during the initial consent grant).
pub struct TokenManager {
    client_id: String,
    client_secret: String,
    token_path: PathBuf,
    tokens: Mutex<Option<TokenData>>,
    http_client: reqwest::Client,
}

impl TokenManager {
    pub fn new(config: &Config) -> Result<Self> {
        let token_path = token_store::resolve_token_path(config.auth.token_path.as_deref())?;
        let tokens = if token_path.exists() {
            match token_store::load_tokens(&token_path) {
                Ok(t) => {
                    tracing::info!("loaded existing tokens");
                    Some(t)
                }
                Err(e) => {
                    tracing::warn!("failed to load tokens: {e:#}");
                    None
                }
            }
        } else {
            None
        };

        if tokens.is_none() {
            tracing::warn!(
                path = %token_path.display(),
                "no token file — seed it with a Drive refresh token"
            );
        }

        Ok(Self {
            client_id: config.auth.client_id.clone(),
            client_secret: config.auth.client_secret.clone(),
            token_path,
            tokens: Mutex::new(tokens),
            http_client: reqwest::Client::new(),
        })
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        let mut guard = self.tokens.lock().await;
        let tokens = guard.as_mut().with_context(|| {
            format!(
                "Not authenticated. Seed {} with a refresh token.",
                self.token_path.display()
            )
        })?;

        // Refresh if token expires within 60 seconds
        let now = chrono::Utc::now();
        let buffer = chrono::Duration::seconds(60);
        if tokens.access_token.is_empty() || tokens.expires_at <= now + buffer {
            tracing::debug!("access token expired or expiring soon, refreshing");
            let refreshed = self.refresh(tokens).await?;
            *tokens = refreshed;
            token_store::save_tokens(&self.token_path, tokens)?;
            tracing::debug!("token refreshed successfully");
        }

        Ok(tokens.access_token.clone())
    }

    async fn refresh(&self, tokens: &TokenData) -> Result<TokenData> {
        #[derive(serde::Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: u64,
        }

        let resp = self
            .http_client
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", tokens.refresh_token.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .context("Failed to contact Google token endpoint")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "Token refresh failed ({status}): {body}\n\
                 The refresh token may have been revoked — re-seed the token file."
            );
        }

        let tr: TokenResponse = resp
            .json()
            .await
            .context("Failed to parse token response")?;
        let expires_at = chrono::Utc::now() + chrono::Duration::seconds(tr.expires_in as i64);

        // Google does not rotate refresh tokens on refresh — keep the old one.
        Ok(TokenData {
            access_token: tr.access_token,
            refresh_token: tokens.refresh_token.clone(),
            expires_at,
        })
    }
}
