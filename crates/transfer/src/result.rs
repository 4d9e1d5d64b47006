use crate::file::{META_SRC, TransferFile};
use std::fmt;
use std::sync::Arc;
use twin_hash::SourceHandle;

/// Record handed to the embedding application once a file is in the store,
/// whether it was transferred or not.
#[derive(Clone)]
pub struct TransferResult {
    /// The content digest.
    pub id: String,
    pub url: Option<String>,
    pub src: Option<String>,
    pub extension: Option<String>,
    pub data: SourceHandle,
    pub content_type: Option<String>,
    /// `true` when no bytes were sent.
    pub instant: bool,
}

impl TransferResult {
    /// Built from the file as the registry holds it after finalizing. The
    /// response URL wins over the state's `upload_url`.
    pub(crate) fn from_file(file: &TransferFile, digest: &str) -> Self {
        let response = file.state.response.as_ref();
        Self {
            id: digest.to_string(),
            url: response.and_then(|r| r.upload_url.clone()).or_else(|| file.state.upload_url.clone()),
            src: file.meta_str(META_SRC).map(str::to_string),
            extension: file.extension.clone(),
            data: Arc::clone(&file.data),
            content_type: file.effective_content_type().map(str::to_string),
            instant: response.is_some_and(|r| r.instant),
        }
    }
}

impl fmt::Debug for TransferResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferResult")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("src", &self.src)
            .field("extension", &self.extension)
            .field("content_type", &self.content_type)
            .field("instant", &self.instant)
            .finish_non_exhaustive()
    }
}

/// Invoked once per finalized file.
pub type ResultCallback = Arc<dyn Fn(&TransferResult) + Send + Sync>;
