//! The host's view of a file queued for transfer.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use twin_hash::{LocalSource, SourceHandle};

/// Metadata key holding the content digest.
pub const META_MD5: &str = "md5";
/// Metadata key holding the canonical source reported by the catalog.
pub const META_SRC: &str = "src";
/// Metadata key that, when set, overrides the file's own content type.
pub const META_TYPE: &str = "type";

/// Free-form file metadata. Patches are merged key by key.
pub type Meta = BTreeMap<String, Value>;

/// Identifier assigned by the host; stable across re-registration.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(String);
impl FileId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<String> for FileId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub upload_started: bool,
    pub upload_complete: bool,
}
impl Progress {
    pub fn complete() -> Self {
        Self { upload_started: true, upload_complete: true }
    }
}

/// What the transfer layer (or the orchestrator, for skipped uploads)
/// reported once a file's content was in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResponse {
    pub upload_url: Option<String>,
    /// The store already had the content; no bytes were sent.
    pub instant: bool,
}
impl TransferResponse {
    pub fn uploaded(url: impl Into<String>) -> Self {
        Self { upload_url: Some(url.into()), instant: false }
    }

    pub fn instant(url: impl Into<String>) -> Self {
        Self { upload_url: Some(url.into()), instant: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferState {
    pub progress: Progress,
    pub response: Option<TransferResponse>,
    pub upload_url: Option<String>,
}

/// Partial update to a [`TransferState`]; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatePatch {
    pub progress: Option<Progress>,
    pub response: Option<TransferResponse>,
    pub upload_url: Option<String>,
}
impl StatePatch {
    pub fn progress(mut self, progress: Progress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn response(mut self, response: TransferResponse) -> Self {
        self.response = Some(response);
        self
    }

    pub fn upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = Some(url.into());
        self
    }

    pub fn apply(self, state: &mut TransferState) {
        if let Some(progress) = self.progress {
            state.progress = progress;
        }
        if let Some(response) = self.response {
            state.response = Some(response);
        }
        if let Some(url) = self.upload_url {
            state.upload_url = Some(url);
        }
    }
}

#[derive(Clone)]
pub struct TransferFile {
    pub id: FileId,
    pub name: String,
    pub extension: Option<String>,
    pub content_type: Option<String>,
    pub data: SourceHandle,
    pub meta: Meta,
    pub state: TransferState,
}

impl TransferFile {
    /// Extension and content type are derived from `name`.
    pub fn new(id: impl Into<FileId>, name: impl Into<String>, data: SourceHandle) -> Self {
        let name = name.into();
        let path = Path::new(&name);
        let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
        let content_type = mime_guess::from_path(path).first().map(|mime| mime.essence_str().to_string());
        Self { id: id.into(), name, extension, content_type, data, meta: Meta::new(), state: TransferState::default() }
    }

    /// Open a file on disk, using its path as the identifier.
    pub async fn from_path(path: impl AsRef<Path>) -> twin_hash::error::Result<Self> {
        let path = path.as_ref();
        let source = LocalSource::open(path).await?;
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        Ok(Self::new(path.display().to_string(), name, Arc::new(source)))
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// String metadata value; empty strings count as absent.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// The digest recorded in metadata, if any.
    pub fn digest(&self) -> Option<&str> {
        self.meta_str(META_MD5)
    }

    /// Metadata `type` takes precedence over the detected content type.
    pub fn effective_content_type(&self) -> Option<&str> {
        self.meta_str(META_TYPE).or(self.content_type.as_deref())
    }

    pub fn is_complete(&self) -> bool {
        self.state.progress.upload_complete
    }
}

impl fmt::Debug for TransferFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferFile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("extension", &self.extension)
            .field("content_type", &self.content_type)
            .field("size", &self.data.len())
            .field("meta", &self.meta)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use std::io::Write;
    use twin_hash::MemorySource;

    fn file(name: &str) -> TransferFile {
        TransferFile::new("f1", name, Arc::new(MemorySource::new(*b"%PDF-1.4")))
    }

    #[rstest]
    #[case("report.pdf", Some("pdf"), Some("application/pdf"))]
    #[case("Photo.JPG", Some("jpg"), Some("image/jpeg"))]
    #[case("README", None, None)]
    fn test_detect_from_name(#[case] name: &str, #[case] ext: Option<&str>, #[case] mime: Option<&str>) {
        let file = file(name);
        assert_eq!(file.extension.as_deref(), ext);
        assert_eq!(file.content_type.as_deref(), mime);
    }

    #[test]
    fn test_effective_content_type() {
        let file = file("report.pdf");
        assert_eq!(file.effective_content_type(), Some("application/pdf"));
        let file = file.with_meta(META_TYPE, "application/x-report");
        assert_eq!(file.effective_content_type(), Some("application/x-report"));
    }

    #[rstest]
    #[case(json!("abc123"), Some("abc123"))]
    #[case(json!(""), None)]
    #[case(json!(42), None)]
    fn test_digest_from_meta(#[case] value: Value, #[case] expected: Option<&str>) {
        let file = file("report.pdf").with_meta(META_MD5, value);
        assert_eq!(file.digest(), expected);
    }

    #[test]
    fn test_state_patch_leaves_unset_fields() {
        let mut state = TransferState { upload_url: Some("/old".to_string()), ..TransferState::default() };
        StatePatch::default().progress(Progress::complete()).apply(&mut state);
        assert!(state.progress.upload_complete);
        assert_eq!(state.upload_url.as_deref(), Some("/old"));
        assert_eq!(state.response, None);

        StatePatch::default().response(TransferResponse::instant("/new")).upload_url("/new").apply(&mut state);
        assert_eq!(state.upload_url.as_deref(), Some("/new"));
        assert_eq!(state.response, Some(TransferResponse::instant("/new")));
    }

    #[tokio::test]
    async fn test_from_path() {
        let mut tmp = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        tmp.write_all(b"hello world").unwrap();
        let file = TransferFile::from_path(tmp.path()).await.unwrap();
        assert_eq!(file.id.as_str(), tmp.path().display().to_string());
        assert_eq!(file.extension.as_deref(), Some("txt"));
        assert_eq!(file.content_type.as_deref(), Some("text/plain"));
        assert_eq!(file.data.len(), 11);
    }
}
