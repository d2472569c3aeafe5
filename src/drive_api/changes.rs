use reqwest::Method;

use crate::error::DriveError;

use super::client::DriveClient;
use super::types::{Change, ChangeList, StartPageToken};

/// Opaque position in the Drive change feed.
///
/// Typed so a cursor persisted for one folder's subscription cannot be
/// confused with an arbitrary string or reused across feeds by accident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl DriveClient {
    /// Capture the current feed position ("now", no change history).
    /// Must be called once before the first delta fetch.
    pub async fn start_page_token_impl(&self) -> Result<Cursor, DriveError> {
        let resp = self
            .api_request(Method::GET, "/changes/startPageToken")
            .query(&[("supportsAllDrives", "true")])
            .send()
            .await?;

        let token: StartPageToken = resp
            .json()
            .await
            .map_err(|e| DriveError::Protocol(format!("bad start page token response: {e}")))?;

        Ok(Cursor::new(token.start_page_token))
    }

    /// Fetch the change window since `cursor`, following intermediate pages
    /// until the feed hands back a terminal `newStartPageToken`.
    ///
    /// Drive rejects a token that has aged out of the feed's retention with
    /// a 400/404 — surfaced as `StaleCursor` so the caller can fall back to
    /// a full rescan.
    pub async fn list_changes_impl(
        &self,
        cursor: &Cursor,
    ) -> Result<(Vec<Change>, Cursor), DriveError> {
        let mut all_changes = Vec::new();
        let mut page_token = cursor.as_str().to_string();

        loop {
            let resp = self
                .api_request(Method::GET, "/changes")
                .query(&[
                    ("pageToken", page_token.as_str()),
                    (
                        "fields",
                        "nextPageToken,newStartPageToken,\
                         changes(fileId,removed,\
                         file(id,name,mimeType,parents,modifiedTime,shortcutDetails,trashed))",
                    ),
                    ("pageSize", "100"),
                    ("supportsAllDrives", "true"),
                    ("includeItemsFromAllDrives", "true"),
                ])
                .send()
                .await
                .map_err(reject_stale)?;

            let page: ChangeList = resp
                .json()
                .await
                .map_err(|e| DriveError::Protocol(format!("bad change list response: {e}")))?;

            all_changes.extend(page.changes);

            if let Some(next) = page.next_page_token {
                page_token = next;
                continue;
            }

            let new_start = page
                .new_start_page_token
                .ok_or_else(|| DriveError::Protocol("change feed ended without a token".into()))?;
            return Ok((all_changes, Cursor::new(new_start)));
        }
    }
}

/// A 400/404 on the changes endpoint means the page token aged out.
fn reject_stale(err: DriveError) -> DriveError {
    match err {
        DriveError::NotFound(_) | DriveError::Protocol(_) => DriveError::StaleCursor,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_is_opaque_but_comparable() {
        let a = Cursor::new("1234");
        let b = Cursor::new("1234");
        let c = Cursor::new("9999");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str(), "1234");
    }

    #[test]
    fn stale_rejection_maps_protocol_and_not_found() {
        assert!(reject_stale(DriveError::NotFound("gone".into())).is_stale_cursor());
        assert!(reject_stale(DriveError::Protocol("HTTP 400".into())).is_stale_cursor());
        assert!(!reject_stale(DriveError::Transient("503".into())).is_stale_cursor());
    }
}
