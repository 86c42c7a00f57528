#![allow(dead_code)]

//! Shared mock backends for integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::stream;

use converse::ServerConfig;
use converse::core::docstore::{DocStoreError, DocumentRef, DocumentStore};
use converse::core::llm::{ChatBackend, ChatMessage, LlmError};
use converse::core::stt::{
    BaseStt, SttError, SttErrorCallback, SttFactory, SttResult, SttResultCallback,
};
use converse::core::tts::{AudioStream, SpeechSynthesizer, TtsError};

/// Config with fast teardown timings for tests.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        shutdown_grace_ms: 500,
        ..ServerConfig::default()
    }
}

// ---------------------------------------------------------------------------
// STT

#[derive(Default)]
struct SttInner {
    connected: bool,
    fail_connect: bool,
    result_cb: Option<SttResultCallback>,
    error_cb: Option<SttErrorCallback>,
    audio: Vec<Bytes>,
    finish_calls: usize,
    disconnect_calls: usize,
}

/// Scripted STT engine. The probe half lets a test drive recognition
/// results in and observe lifecycle calls.
pub struct MockStt {
    inner: Arc<Mutex<SttInner>>,
}

#[derive(Clone)]
pub struct SttProbe {
    inner: Arc<Mutex<SttInner>>,
}

impl MockStt {
    pub fn new() -> (Self, SttProbe) {
        let inner = Arc::new(Mutex::new(SttInner::default()));
        (
            Self {
                inner: inner.clone(),
            },
            SttProbe { inner },
        )
    }

    pub fn failing_connect() -> (Self, SttProbe) {
        let (stt, probe) = Self::new();
        stt.inner.lock().unwrap().fail_connect = true;
        (stt, probe)
    }
}

impl SttProbe {
    /// Deliver one recognition result through the registered callback, the
    /// way a live engine would from its read task.
    pub async fn push_result(&self, result: SttResult) {
        let cb = self.inner.lock().unwrap().result_cb.clone();
        let cb = cb.expect("result callback not registered");
        cb(result).await;
    }

    /// Deliver one segment: a final result carrying `transcript`, with the
    /// endpoint flag set when `boundary` is true.
    pub async fn push_segment(&self, transcript: &str, boundary: bool) {
        self.push_result(SttResult::new(transcript.to_string(), true, boundary, 0.9))
            .await;
    }

    pub async fn push_error(&self, error: SttError) {
        let cb = self.inner.lock().unwrap().error_cb.clone();
        let cb = cb.expect("error callback not registered");
        cb(error).await;
    }

    pub async fn wait_connected(&self) {
        for _ in 0..200 {
            if self.inner.lock().unwrap().connected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("STT engine never connected");
    }

    pub fn audio_bytes(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .audio
            .iter()
            .map(|chunk| chunk.len())
            .sum()
    }

    pub fn finish_calls(&self) -> usize {
        self.inner.lock().unwrap().finish_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        self.inner.lock().unwrap().disconnect_calls
    }
}

#[async_trait::async_trait]
impl BaseStt for MockStt {
    async fn connect(&mut self) -> Result<(), SttError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_connect {
            return Err(SttError::ConnectionFailed("scripted failure".to_string()));
        }
        inner.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), SttError> {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = false;
        inner.disconnect_calls += 1;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.inner.lock().unwrap().connected
    }

    async fn send_audio(&mut self, audio: Bytes) -> Result<(), SttError> {
        self.inner.lock().unwrap().audio.push(audio);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SttError> {
        self.inner.lock().unwrap().finish_calls += 1;
        Ok(())
    }

    async fn on_result(&mut self, callback: SttResultCallback) -> Result<(), SttError> {
        self.inner.lock().unwrap().result_cb = Some(callback);
        Ok(())
    }

    async fn on_error(&mut self, callback: SttErrorCallback) -> Result<(), SttError> {
        self.inner.lock().unwrap().error_cb = Some(callback);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

pub struct MockSttFactory;

impl SttFactory for MockSttFactory {
    fn create(&self) -> Result<Box<dyn BaseStt>, SttError> {
        let (stt, _probe) = MockStt::new();
        Ok(Box::new(stt))
    }
}

// ---------------------------------------------------------------------------
// LLM

#[derive(Default)]
struct LlmInner {
    calls: Vec<Vec<ChatMessage>>,
    replies: VecDeque<Result<String, LlmError>>,
}

/// Scripted chat backend recording every request it receives.
#[derive(Clone, Default)]
pub struct MockLlm {
    inner: Arc<Mutex<LlmInner>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_reply(&self, reply: &str) {
        self.inner
            .lock()
            .unwrap()
            .replies
            .push_back(Ok(reply.to_string()));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.inner.lock().unwrap().replies.push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.inner.lock().unwrap().calls.clone()
    }
}

#[async_trait::async_trait]
impl ChatBackend for MockLlm {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(messages.to_vec());
        inner
            .replies
            .pop_front()
            .unwrap_or_else(|| Ok("Understood.".to_string()))
    }
}

// ---------------------------------------------------------------------------
// TTS

#[derive(Clone)]
pub enum TtsScript {
    /// Every synthesis yields these chunks.
    Chunks(Vec<Bytes>),
    /// Synthesis itself is refused.
    FailSynthesis,
    /// The stream yields one chunk, then an error.
    FailMidStream,
}

#[derive(Clone)]
pub struct MockTts {
    script: TtsScript,
    spoken: Arc<Mutex<Vec<String>>>,
}

impl MockTts {
    pub fn new() -> Self {
        Self::with_script(TtsScript::Chunks(vec![Bytes::from_static(b"\x00\x01")]))
    }

    pub fn with_script(script: TtsScript) -> Self {
        Self {
            script,
            spoken: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for MockTts {
    async fn synthesize(&self, text: &str) -> Result<AudioStream, TtsError> {
        self.spoken.lock().unwrap().push(text.to_string());
        match &self.script {
            TtsScript::Chunks(chunks) => {
                let items: Vec<Result<Bytes, TtsError>> =
                    chunks.iter().cloned().map(Ok).collect();
                Ok(Box::pin(stream::iter(items)))
            }
            TtsScript::FailSynthesis => {
                Err(TtsError::ProviderError("synthesis refused".to_string()))
            }
            TtsScript::FailMidStream => {
                let items = vec![
                    Ok(Bytes::from_static(b"\x00\x01")),
                    Err(TtsError::NetworkError("stream dropped".to_string())),
                ];
                Ok(Box::pin(stream::iter(items)))
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Document store

#[derive(Clone, Default)]
pub struct MockDocStore {
    uploads: Arc<Mutex<Vec<(String, usize)>>>,
}

impl MockDocStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploads(&self) -> Vec<(String, usize)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MockDocStore {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<DocumentRef, DocStoreError> {
        self.uploads
            .lock()
            .unwrap()
            .push((filename.to_string(), bytes.len()));
        Ok(DocumentRef::new(format!("file-{filename}")))
    }
}
