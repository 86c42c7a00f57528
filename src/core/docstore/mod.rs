//! Document store contract: persisting an uploaded file and handing back an
//! opaque reference the conversation can attach to a user turn.

pub mod openai;

pub use openai::OpenAiFileStore;

/// Opaque reference to an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef(String);

impl DocumentRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DocStoreError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Upload `bytes` under `filename`, returning an opaque reference.
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<DocumentRef, DocStoreError>;
}
