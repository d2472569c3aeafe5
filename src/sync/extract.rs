use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::drive_api::types::{EXPORT_CSV_MIME, EXPORT_PDF_MIME};
use crate::drive_api::{DriveApi, DriveFile, FileKind};

use super::classify::Tag;

/// What the extractor backend is being handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractKind {
    Pdf,
    Image,
}

/// Backend that turns document bytes into text. Injected so the engine
/// stays independent of whichever OCR/LLM service sits behind it.
#[async_trait]
pub trait ExtractText: Send + Sync {
    async fn extract_text(&self, bytes: &[u8], kind: ExtractKind, category: Tag)
        -> Result<String>;
}

/// Fetch a file's content and reduce it to text, routed by mime kind.
///
/// Returns `Ok(None)` for content the engine deliberately skips (binary
/// blobs it cannot read); errors are real failures worth reporting.
pub async fn fetch_and_extract(
    api: &dyn DriveApi,
    extractor: &dyn ExtractText,
    file: &DriveFile,
    category: Tag,
) -> Result<Option<String>> {
    let text = match file.kind() {
        FileKind::Image => {
            let bytes = api.download(&file.id).await?;
            Some(extractor.extract_text(&bytes, ExtractKind::Image, category).await?)
        }
        FileKind::Pdf => {
            let bytes = api.download(&file.id).await?;
            Some(extractor.extract_text(&bytes, ExtractKind::Pdf, category).await?)
        }
        FileKind::Spreadsheet => {
            let bytes = api.export(&file.id, EXPORT_CSV_MIME).await?;
            Some(decode_text(&bytes))
        }
        FileKind::Document | FileKind::Presentation => {
            let bytes = api.export(&file.id, EXPORT_PDF_MIME).await?;
            Some(extractor.extract_text(&bytes, ExtractKind::Pdf, category).await?)
        }
        FileKind::Text => {
            let bytes = api.download(&file.id).await?;
            Some(decode_text(&bytes))
        }
        FileKind::Other => {
            let bytes = api.download(&file.id).await?;
            sniff_unknown(extractor, category, bytes).await?
        }
        FileKind::Folder | FileKind::Shortcut => None,
    };

    Ok(text.filter(|t| !t.trim().is_empty()))
}

/// Unknown mime types: a `%PDF` magic header gets the PDF path, valid UTF-8
/// is taken as-is, anything else is skipped.
async fn sniff_unknown(
    extractor: &dyn ExtractText,
    category: Tag,
    bytes: Vec<u8>,
) -> Result<Option<String>> {
    if bytes.starts_with(b"%PDF") {
        let text = extractor.extract_text(&bytes, ExtractKind::Pdf, category).await?;
        return Ok(Some(text));
    }
    match String::from_utf8(bytes) {
        Ok(text) => Ok(Some(text)),
        Err(_) => Ok(None),
    }
}

/// Extractor backed by an external HTTP text-extraction service.
///
/// Posts the raw bytes and reads text back. Which OCR or model sits behind
/// the URL is the service's business.
pub struct HttpExtractor {
    http: reqwest::Client,
    url: Option<String>,
}

impl HttpExtractor {
    pub fn new(url: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self { http, url }
    }
}

#[async_trait]
impl ExtractText for HttpExtractor {
    async fn extract_text(
        &self,
        bytes: &[u8],
        kind: ExtractKind,
        category: Tag,
    ) -> Result<String> {
        let Some(url) = &self.url else {
            anyhow::bail!("no extractor backend configured (set extractor.url)");
        };
        let kind_str = match kind {
            ExtractKind::Pdf => "pdf",
            ExtractKind::Image => "image",
        };

        let resp = self
            .http
            .post(url)
            .query(&[("kind", kind_str), ("category", category.as_str())])
            .body(bytes.to_vec())
            .send()
            .await
            .context("extractor request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("extractor returned HTTP {}", resp.status());
        }
        resp.text().await.context("extractor response unreadable")
    }
}

/// UTF-8 first, Latin-1 as the fallback. Latin-1 maps every byte to the
/// code point of the same value, so it never fails.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
