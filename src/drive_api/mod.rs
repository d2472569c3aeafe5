mod changes;
mod channels;
mod client;
mod files;
pub mod types;

pub use changes::Cursor;
pub use client::DriveClient;
pub use types::{Change, Channel, DriveFile, FileKind};

use async_trait::async_trait;

use crate::error::DriveError;

/// The outbound Drive surface the sync engine depends on.
///
/// The engine takes this as an injected dependency so tests can substitute
/// an in-memory store for the real HTTP client.
#[async_trait]
pub trait DriveApi: Send + Sync {
    async fn find_folder_by_name(
        &self,
        name: &str,
        parent_id: &str,
    ) -> Result<Option<DriveFile>, DriveError>;

    async fn list_folders(&self, parent_id: &str) -> Result<Vec<DriveFile>, DriveError>;

    async fn list_children(&self, folder_id: &str) -> Result<Vec<DriveFile>, DriveError>;

    async fn file_metadata(&self, file_id: &str) -> Result<DriveFile, DriveError>;

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, DriveError>;

    async fn export(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>, DriveError>;

    async fn watch_folder(
        &self,
        folder_id: &str,
        channel_id: &str,
        callback_url: &str,
        token: Option<&str>,
    ) -> Result<Channel, DriveError>;

    async fn stop_channel(&self, channel_id: &str, resource_id: &str) -> Result<(), DriveError>;

    async fn start_page_token(&self) -> Result<Cursor, DriveError>;

    async fn list_changes(&self, cursor: &Cursor) -> Result<(Vec<Change>, Cursor), DriveError>;
}

#[async_trait]
impl DriveApi for DriveClient {
    async fn find_folder_by_name(
        &self,
        name: &str,
        parent_id: &str,
    ) -> Result<Option<DriveFile>, DriveError> {
        self.find_folder_by_name_impl(name, parent_id).await
    }

    async fn list_folders(&self, parent_id: &str) -> Result<Vec<DriveFile>, DriveError> {
        self.list_folders_impl(parent_id).await
    }

    async fn list_children(&self, folder_id: &str) -> Result<Vec<DriveFile>, DriveError> {
        self.list_children_impl(folder_id).await
    }

    async fn file_metadata(&self, file_id: &str) -> Result<DriveFile, DriveError> {
        self.file_metadata_impl(file_id).await
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, DriveError> {
        self.download_impl(file_id).await
    }

    async fn export(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>, DriveError> {
        self.export_impl(file_id, mime_type).await
    }

    async fn watch_folder(
        &self,
        folder_id: &str,
        channel_id: &str,
        callback_url: &str,
        token: Option<&str>,
    ) -> Result<Channel, DriveError> {
        self.watch_folder_impl(folder_id, channel_id, callback_url, token)
            .await
    }

    async fn stop_channel(&self, channel_id: &str, resource_id: &str) -> Result<(), DriveError> {
        self.stop_channel_impl(channel_id, resource_id).await
    }

    async fn start_page_token(&self) -> Result<Cursor, DriveError> {
        self.start_page_token_impl().await
    }

    async fn list_changes(&self, cursor: &Cursor) -> Result<(Vec<Change>, Cursor), DriveError> {
        self.list_changes_impl(cursor).await
    }
}
