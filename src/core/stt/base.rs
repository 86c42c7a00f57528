use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Result structure containing transcription data from the STT engine
#[derive(Debug, Clone, PartialEq)]
pub struct SttResult {
    /// The transcribed text from the audio
    pub transcript: String,
    /// Whether this is a final transcription result (not an interim result)
    pub is_final: bool,
    /// Whether the engine's endpoint detector considers the current speech
    /// segment finished
    pub is_speech_final: bool,
    /// Confidence score of the transcription (0.0 to 1.0)
    pub confidence: f32,
}

impl SttResult {
    pub fn new(transcript: String, is_final: bool, is_speech_final: bool, confidence: f32) -> Self {
        Self {
            transcript,
            is_final,
            is_speech_final,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Configuration for STT engines
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct SttConfig {
    /// API key for the STT engine
    pub api_key: String,
    /// Model to use for transcription
    pub model: String,
    /// Language code for transcription (e.g., "en-US", "es-ES")
    pub language: String,
    /// Sample rate of the audio in Hz
    pub sample_rate: u32,
    /// Number of audio channels (1 for mono, 2 for stereo)
    pub channels: u16,
    /// Enable punctuation in results
    pub punctuation: bool,
    /// Encoding of the audio
    pub encoding: String,
    /// Silence window in milliseconds after which the engine reports an
    /// utterance end
    pub utterance_end_ms: u32,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "nova-2".to_string(),
            language: "en-US".to_string(),
            sample_rate: 16000,
            channels: 1,
            punctuation: true,
            encoding: "linear16".to_string(),
            utterance_end_ms: 1000,
        }
    }
}

/// Error types for STT operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum SttError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Type alias for STT result callback
pub type SttResultCallback =
    Arc<dyn Fn(SttResult) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Type alias for STT streaming-error callback
pub type SttErrorCallback =
    Arc<dyn Fn(SttError) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Base trait for speech-to-text engines.
///
/// Covers both push-streaming engines (callback-driven, the usual case) and
/// one-shot batch engines, which can satisfy the contract by emitting a
/// single final result from `send_audio`.
#[async_trait::async_trait]
pub trait BaseStt: Send + Sync {
    /// Connect to the STT engine. A failure here is fatal to the session
    /// before any turn is processed.
    async fn connect(&mut self) -> Result<(), SttError>;

    /// Disconnect from the STT engine and release its resources.
    async fn disconnect(&mut self) -> Result<(), SttError>;

    /// Check if the connection is ready to be used
    fn is_ready(&self) -> bool;

    /// Send audio data to the engine for transcription
    async fn send_audio(&mut self, audio: Bytes) -> Result<(), SttError>;

    /// Flush and close the audio stream, letting the engine deliver any
    /// trailing results.
    async fn finish(&mut self) -> Result<(), SttError>;

    /// Register a callback triggered when transcription results arrive
    async fn on_result(&mut self, callback: SttResultCallback) -> Result<(), SttError>;

    /// Register a callback triggered when errors occur during streaming.
    ///
    /// Streaming errors after the initial connection (permission denied,
    /// rate limits, dropped sockets) surface here.
    async fn on_error(&mut self, callback: SttErrorCallback) -> Result<(), SttError>;

    /// Engine-specific identifier
    fn provider_name(&self) -> &'static str;
}
