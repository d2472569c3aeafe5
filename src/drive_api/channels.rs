use reqwest::Method;
use serde::Serialize;

use crate::error::DriveError;

use super::client::DriveClient;
use super::types::Channel;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WatchRequest<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    channel_type: &'a str,
    address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StopRequest<'a> {
    id: &'a str,
    resource_id: &'a str,
}

impl DriveClient {
    /// Register a push-notification channel watching a folder.
    pub async fn watch_folder_impl(
        &self,
        folder_id: &str,
        channel_id: &str,
        callback_url: &str,
        token: Option<&str>,
    ) -> Result<Channel, DriveError> {
        let body = WatchRequest {
            id: channel_id,
            channel_type: "web_hook",
            address: callback_url,
            token,
        };

        let resp = self
            .api_request(Method::POST, &format!("/files/{folder_id}/watch"))
            .query(&[("supportsAllDrives", "true")])
            .json(&body)
            .send()
            .await?;

        resp.json()
            .await
            .map_err(|e| DriveError::Protocol(format!("bad watch response: {e}")))
    }

    /// Stop a push-notification channel.
    pub async fn stop_channel_impl(
        &self,
        channel_id: &str,
        resource_id: &str,
    ) -> Result<(), DriveError> {
        let body = StopRequest {
            id: channel_id,
            resource_id,
        };

        self.api_request(Method::POST, "/channels/stop")
            .json(&body)
            .send()
            .await?;

        Ok(())
    }
}
