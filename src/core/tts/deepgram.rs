//! Deepgram speech synthesis over the `/v1/speak` HTTP endpoint.
//!
//! The response body is streamed straight through as the `AudioStream`, so
//! the first audio chunk reaches the client before synthesis finishes.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::StatusCode;
use tracing::debug;

use super::base::{AudioStream, SpeechSynthesizer, TtsConfig, TtsError};

const DEEPGRAM_SPEAK_URL: &str = "https://api.deepgram.com/v1/speak";

pub struct DeepgramTts {
    client: reqwest::Client,
    config: TtsConfig,
}

impl DeepgramTts {
    pub fn new(client: reqwest::Client, config: TtsConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl SpeechSynthesizer for DeepgramTts {
    async fn synthesize(&self, text: &str) -> Result<AudioStream, TtsError> {
        if self.config.api_key.is_empty() {
            return Err(TtsError::ConfigurationError(
                "Deepgram API key is not set".to_string(),
            ));
        }

        debug!("Synthesizing {} characters with Deepgram", text.len());
        let response = self
            .client
            .post(DEEPGRAM_SPEAK_URL)
            .query(&[("model", self.config.voice.as_str())])
            .header("Authorization", format!("Token {}", self.config.api_key))
            .json(&serde_json::json!({ "text": text }))
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .send()
            .await
            .map_err(|e| TtsError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TtsError::AuthenticationFailed(status.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::ProviderError(format!("HTTP {status}: {body}")));
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| TtsError::NetworkError(e.to_string()));
        Ok(Box::pin(stream))
    }

    fn provider_name(&self) -> &'static str {
        "deepgram"
    }
}
