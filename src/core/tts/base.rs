use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A finite, lazily-produced stream of encoded audio chunks.
pub type AudioStream = Pin<Box<dyn Stream<Item = Result<Bytes, TtsError>> + Send>>;

/// Error types for TTS operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum TtsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Configuration for TTS providers
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// API key for the TTS provider
    pub api_key: String,
    /// Voice model identifier (e.g., "aura-luna-en")
    pub voice: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            voice: "aura-luna-en".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Base trait for text-to-speech providers.
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` into a finite stream of encoded audio chunks.
    ///
    /// The stream is consumed chunk by chunk so playback can start before
    /// synthesis completes.
    async fn synthesize(&self, text: &str) -> Result<AudioStream, TtsError>;

    /// Provider-specific identifier
    fn provider_name(&self) -> &'static str;
}
