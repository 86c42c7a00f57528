//! OpenAI Files binding: multipart upload with `purpose=user_data`.

use async_trait::async_trait;
use tracing::debug;

use super::{DocStoreError, DocumentRef, DocumentStore};

const OPENAI_FILES_URL: &str = "https://api.openai.com/v1/files";

pub struct OpenAiFileStore {
    client: reqwest::Client,
    api_key: String,
}

impl OpenAiFileStore {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl DocumentStore for OpenAiFileStore {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<DocumentRef, DocStoreError> {
        if self.api_key.is_empty() {
            return Err(DocStoreError::Configuration(
                "OpenAI API key is not set".to_string(),
            ));
        }

        debug!("Uploading {} ({} bytes)", filename, bytes.len());
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .text("purpose", "user_data")
            .part("file", part);

        let response = self
            .client
            .post(OPENAI_FILES_URL)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DocStoreError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DocStoreError::Provider(format!("HTTP {status}: {body}")));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DocStoreError::Provider(e.to_string()))?;
        value["id"]
            .as_str()
            .map(DocumentRef::new)
            .ok_or_else(|| DocStoreError::Provider("response missing file id".to_string()))
    }
}
