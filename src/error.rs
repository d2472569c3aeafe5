use thiserror::Error;

/// Failure categories for outbound Drive calls.
///
/// The sync engine keys its recovery behavior off these: transient and
/// extraction failures skip a file, `NotFound` is treated as zero results,
/// `Authorization` surfaces as a configuration problem, and `StaleCursor`
/// forces a cursor re-initialization plus full folder rescan.
#[derive(Debug, Error)]
pub enum DriveError {
    /// Network failure or 5xx from the Drive API.
    #[error("transient Drive error: {0}")]
    Transient(String),

    /// 401/403 — the service credentials lack access.
    #[error("Drive authorization failed: {0}")]
    Authorization(String),

    /// The file or folder vanished between listing and fetch.
    #[error("not found: {0}")]
    NotFound(String),

    /// The change feed rejected our page token as too old.
    #[error("change cursor rejected as stale")]
    StaleCursor,

    /// Anything else: malformed responses, exhausted retries.
    #[error("Drive protocol error: {0}")]
    Protocol(String),
}

impl DriveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriveError::NotFound(_))
    }

    pub fn is_stale_cursor(&self) -> bool {
        matches!(self, DriveError::StaleCursor)
    }
}
