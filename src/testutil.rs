//! In-memory stand-ins for the external Drive surface, used by the engine
//! tests so whole passes run without a network.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::drive_api::types::{Channel, ShortcutDetails, FOLDER_MIME, SHORTCUT_MIME};
use crate::drive_api::{Change, Cursor, DriveApi, DriveFile};
use crate::error::DriveError;
use crate::sync::classify::Tag;
use crate::sync::extract::{ExtractKind, ExtractText};

pub fn folder(id: &str, name: &str, parent: &str) -> DriveFile {
    file(id, name, FOLDER_MIME, parent)
}

pub fn file(id: &str, name: &str, mime: &str, parent: &str) -> DriveFile {
    DriveFile {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: mime.to_string(),
        parents: vec![parent.to_string()],
        modified_time: None,
        shortcut_details: None,
        trashed: None,
    }
}

pub fn shortcut(id: &str, name: &str, parent: &str, target_id: &str) -> DriveFile {
    let mut f = file(id, name, SHORTCUT_MIME, parent);
    f.shortcut_details = Some(ShortcutDetails {
        target_id: target_id.to_string(),
        target_mime_type: None,
    });
    f
}

#[derive(Default)]
struct FakeState {
    files: HashMap<String, DriveFile>,
    content: HashMap<String, Vec<u8>>,
    seq: u64,
    changes: Vec<(u64, Change)>,
    stale: HashSet<String>,
    fail_watch: bool,
    fail_list: HashSet<String>,
    watches: Vec<(String, String)>,
    stopped: Vec<String>,
    channel_ttl_millis: Option<i64>,
}

/// In-memory Drive: a flat file table plus a sequence-numbered change log.
#[derive(Default)]
pub struct FakeDrive {
    state: Mutex<FakeState>,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_folder(&self, f: DriveFile) {
        self.state.lock().unwrap().files.insert(f.id.clone(), f);
    }

    pub fn put_file(&self, f: DriveFile, content: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.content.insert(f.id.clone(), content.to_vec());
        state.files.insert(f.id.clone(), f);
    }

    /// A file with no readable content: metadata resolves, download 404s.
    pub fn put_broken_file(&self, f: DriveFile) {
        self.state.lock().unwrap().files.insert(f.id.clone(), f);
    }

    pub fn record_change(&self, file_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.seq += 1;
        let change = Change {
            file_id: file_id.to_string(),
            file: state.files.get(file_id).cloned(),
            removed: Some(false),
        };
        let seq = state.seq;
        state.changes.push((seq, change));
    }

    pub fn record_removal(&self, file_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.seq += 1;
        let change = Change {
            file_id: file_id.to_string(),
            file: None,
            removed: Some(true),
        };
        let seq = state.seq;
        state.changes.push((seq, change));
    }

    pub fn mark_stale(&self, cursor: &str) {
        self.state.lock().unwrap().stale.insert(cursor.to_string());
    }

    pub fn set_fail_watch(&self, fail: bool) {
        self.state.lock().unwrap().fail_watch = fail;
    }

    pub fn fail_listing_of(&self, folder_id: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_list
            .insert(folder_id.to_string());
    }

    pub fn set_channel_ttl_millis(&self, millis: i64) {
        self.state.lock().unwrap().channel_ttl_millis = Some(millis);
    }

    pub fn watch_count(&self) -> usize {
        self.state.lock().unwrap().watches.len()
    }

    pub fn stopped_channels(&self) -> Vec<String> {
        self.state.lock().unwrap().stopped.clone()
    }

    pub fn current_seq(&self) -> u64 {
        self.state.lock().unwrap().seq
    }
}

#[async_trait]
impl DriveApi for FakeDrive {
    async fn find_folder_by_name(
        &self,
        name: &str,
        parent_id: &str,
    ) -> Result<Option<DriveFile>, DriveError> {
        let folders = self.list_folders(parent_id).await?;
        Ok(folders
            .into_iter()
            .find(|f| f.name.eq_ignore_ascii_case(name)))
    }

    async fn list_folders(&self, parent_id: &str) -> Result<Vec<DriveFile>, DriveError> {
        let children = self.list_children(parent_id).await?;
        Ok(children.into_iter().filter(|f| f.is_folder()).collect())
    }

    async fn list_children(&self, folder_id: &str) -> Result<Vec<DriveFile>, DriveError> {
        let state = self.state.lock().unwrap();
        if state.fail_list.contains(folder_id) {
            return Err(DriveError::Transient("listing failed".into()));
        }
        let mut children: Vec<DriveFile> = state
            .files
            .values()
            .filter(|f| f.parents.iter().any(|p| p == folder_id))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(children)
    }

    async fn file_metadata(&self, file_id: &str) -> Result<DriveFile, DriveError> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(file_id)
            .cloned()
            .ok_or_else(|| DriveError::NotFound(format!("no file {file_id}")))
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, DriveError> {
        self.state
            .lock()
            .unwrap()
            .content
            .get(file_id)
            .cloned()
            .ok_or_else(|| DriveError::NotFound(format!("no content for {file_id}")))
    }

    async fn export(&self, file_id: &str, _mime_type: &str) -> Result<Vec<u8>, DriveError> {
        self.download(file_id).await
    }

    async fn watch_folder(
        &self,
        folder_id: &str,
        channel_id: &str,
        _callback_url: &str,
        _token: Option<&str>,
    ) -> Result<Channel, DriveError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_watch {
            return Err(DriveError::Transient("watch refused".into()));
        }
        state
            .watches
            .push((channel_id.to_string(), folder_id.to_string()));
        let expiration = state
            .channel_ttl_millis
            .map(|ttl| (Utc::now().timestamp_millis() + ttl).to_string());
        Ok(Channel {
            id: channel_id.to_string(),
            resource_id: format!("res-{channel_id}"),
            expiration,
        })
    }

    async fn stop_channel(&self, channel_id: &str, _resource_id: &str) -> Result<(), DriveError> {
        self.state
            .lock()
            .unwrap()
            .stopped
            .push(channel_id.to_string());
        Ok(())
    }

    async fn start_page_token(&self) -> Result<Cursor, DriveError> {
        Ok(Cursor::new(self.state.lock().unwrap().seq.to_string()))
    }

    async fn list_changes(&self, cursor: &Cursor) -> Result<(Vec<Change>, Cursor), DriveError> {
        let state = self.state.lock().unwrap();
        if state.stale.contains(cursor.as_str()) {
            return Err(DriveError::StaleCursor);
        }
        let since: u64 = cursor
            .as_str()
            .parse()
            .map_err(|_| DriveError::StaleCursor)?;
        let window = state
            .changes
            .iter()
            .filter(|(seq, _)| *seq > since)
            .map(|(_, change)| change.clone())
            .collect();
        Ok((window, Cursor::new(state.seq.to_string())))
    }
}

/// Extractor that hands the bytes back as text, so tests can assert on
/// exactly what was fetched.
#[derive(Default)]
pub struct EchoExtractor;

#[async_trait]
impl ExtractText for EchoExtractor {
    async fn extract_text(
        &self,
        bytes: &[u8],
        _kind: ExtractKind,
        _category: Tag,
    ) -> anyhow::Result<String> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}
