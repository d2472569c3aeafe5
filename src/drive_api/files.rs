use reqwest::Method;

use crate::error::DriveError;

use super::client::DriveClient;
use super::types::{DriveFile, FileList, FOLDER_MIME};

/// Fields to request for file metadata and listings.
const FILE_FIELDS: &str = "id,name,mimeType,parents,modifiedTime,shortcutDetails,trashed";

impl DriveClient {
    /// List all items directly inside a folder, handling pagination.
    pub async fn list_children_impl(&self, folder_id: &str) -> Result<Vec<DriveFile>, DriveError> {
        let query = format!("'{folder_id}' in parents and trashed=false");
        self.list_files(&query).await
    }

    /// List only the subfolders of a folder.
    pub async fn list_folders_impl(&self, parent_id: &str) -> Result<Vec<DriveFile>, DriveError> {
        let query =
            format!("'{parent_id}' in parents and mimeType='{FOLDER_MIME}' and trashed=false");
        self.list_files(&query).await
    }

    /// Case-insensitive folder lookup by name under a parent.
    pub async fn find_folder_by_name_impl(
        &self,
        name: &str,
        parent_id: &str,
    ) -> Result<Option<DriveFile>, DriveError> {
        let folders = self.list_folders_impl(parent_id).await?;
        Ok(folders
            .into_iter()
            .find(|f| f.name.eq_ignore_ascii_case(name)))
    }

    async fn list_files(&self, query: &str) -> Result<Vec<DriveFile>, DriveError> {
        let fields = format!("nextPageToken,files({FILE_FIELDS})");
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", query),
                ("fields", fields.as_str()),
                ("pageSize", "100"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ];
            if let Some(ref t) = page_token {
                params.push(("pageToken", t.as_str()));
            }

            let resp = self
                .api_request(Method::GET, "/files")
                .query(&params)
                .send()
                .await?;

            let page: FileList = resp
                .json()
                .await
                .map_err(|e| DriveError::Protocol(format!("bad file list response: {e}")))?;

            all_files.extend(page.files);

            match page.next_page_token {
                Some(t) if !t.is_empty() => page_token = Some(t),
                _ => break,
            }
        }

        Ok(all_files)
    }

    /// Fetch metadata (including parent links and shortcut target) for a file.
    pub async fn file_metadata_impl(&self, file_id: &str) -> Result<DriveFile, DriveError> {
        let resp = self
            .api_request(Method::GET, &format!("/files/{file_id}"))
            .query(&[("fields", FILE_FIELDS), ("supportsAllDrives", "true")])
            .send()
            .await?;

        resp.json()
            .await
            .map_err(|e| DriveError::Protocol(format!("bad file metadata response: {e}")))
    }

    /// Download a file's raw bytes.
    pub async fn download_impl(&self, file_id: &str) -> Result<Vec<u8>, DriveError> {
        let resp = self
            .api_request(Method::GET, &format!("/files/{file_id}"))
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .send()
            .await?;

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| DriveError::Transient(format!("download body failed: {e}")))?;
        Ok(bytes.to_vec())
    }

    /// Export a native Google document/spreadsheet/presentation.
    pub async fn export_impl(
        &self,
        file_id: &str,
        mime_type: &str,
    ) -> Result<Vec<u8>, DriveError> {
        let resp = self
            .api_request(Method::GET, &format!("/files/{file_id}/export"))
            .query(&[("mimeType", mime_type)])
            .send()
            .await?;

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| DriveError::Transient(format!("export body failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}
