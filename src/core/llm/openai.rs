//! OpenAI chat-completions binding.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{ChatBackend, ChatMessage, LlmError};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(client: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }

    fn wire_messages(messages: &[ChatMessage]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|message| {
                let content = match &message.attachment {
                    Some(doc) => {
                        format!("[attached document: {}]\n{}", doc.as_str(), message.content)
                    }
                    None => message.content.clone(),
                };
                json!({ "role": message.role.as_str(), "content": content })
            })
            .collect()
    }
}

#[async_trait]
impl ChatBackend for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::Configuration(
                "OpenAI API key is not set".to_string(),
            ));
        }

        debug!("Calling {} with {} messages", self.model, messages.len());
        let body = json!({
            "model": self.model,
            "messages": Self::wire_messages(messages),
        });

        let response = self
            .client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider(format!("HTTP {status}: {body}")));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Provider(e.to_string()))?;
        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                LlmError::Provider("response missing choices[0].message.content".to_string())
            })
    }
}
