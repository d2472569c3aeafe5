use serde::Deserialize;

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
pub const SHORTCUT_MIME: &str = "application/vnd.google-apps.shortcut";
pub const DOCUMENT_MIME: &str = "application/vnd.google-apps.document";
pub const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
pub const PRESENTATION_MIME: &str = "application/vnd.google-apps.presentation";

/// Export targets for native Google formats.
pub const EXPORT_PDF_MIME: &str = "application/pdf";
pub const EXPORT_CSV_MIME: &str = "text/csv";

/// Coarse routing categories for a Drive mime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Folder,
    Shortcut,
    Document,
    Spreadsheet,
    Presentation,
    Pdf,
    Image,
    Text,
    Other,
}

impl FileKind {
    pub fn from_mime(mime: &str) -> Self {
        match mime {
            FOLDER_MIME => FileKind::Folder,
            SHORTCUT_MIME => FileKind::Shortcut,
            DOCUMENT_MIME => FileKind::Document,
            SPREADSHEET_MIME => FileKind::Spreadsheet,
            PRESENTATION_MIME => FileKind::Presentation,
            "application/pdf" => FileKind::Pdf,
            m if m.starts_with("image/") => FileKind::Image,
            m if m.starts_with("text/") => FileKind::Text,
            _ => FileKind::Other,
        }
    }

    /// Kinds the change feed keeps as sync candidates. Everything else is
    /// skipped to bound extraction cost.
    pub fn is_sync_candidate(&self) -> bool {
        matches!(
            self,
            FileKind::Document
                | FileKind::Spreadsheet
                | FileKind::Presentation
                | FileKind::Pdf
                | FileKind::Image
        )
    }
}

/// File metadata from GET /files/{id} and folder listings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
    #[serde(default)]
    pub shortcut_details: Option<ShortcutDetails>,
    #[serde(default)]
    pub trashed: Option<bool>,
}

impl DriveFile {
    pub fn kind(&self) -> FileKind {
        FileKind::from_mime(&self.mime_type)
    }

    pub fn is_folder(&self) -> bool {
        self.kind() == FileKind::Folder
    }

    pub fn is_shortcut(&self) -> bool {
        self.kind() == FileKind::Shortcut
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortcutDetails {
    pub target_id: String,
    #[serde(default)]
    pub target_mime_type: Option<String>,
}

/// Paginated response from GET /files.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// A single entry from changes.list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub file_id: String,
    #[serde(default)]
    pub file: Option<DriveFile>,
    #[serde(default)]
    pub removed: Option<bool>,
}

/// Paginated response from GET /changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeList {
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub new_start_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPageToken {
    pub start_page_token: String,
}

/// Push channel from POST /files/{id}/watch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub resource_id: String,
    /// Unix epoch milliseconds, as a decimal string.
    #[serde(default)]
    pub expiration: Option<String>,
}

impl Channel {
    pub fn expires_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let millis: i64 = self.expiration.as_deref()?.parse().ok()?;
        chrono::DateTime::from_timestamp_millis(millis)
    }
}

/// Drive API error response body.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveApiErrorBody {
    pub error: DriveApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriveApiErrorDetail {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
}

impl std::fmt::Display for DriveApiErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Drive API error {}: {}",
            self.code.unwrap_or(0),
            self.message.as_deref().unwrap_or("unknown"),
        )
    }
}
