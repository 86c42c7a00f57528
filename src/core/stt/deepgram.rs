//! Deepgram live transcription over WebSocket.
//!
//! Streams raw audio to `wss://api.deepgram.com/v1/listen` and delivers
//! `Results` / `UtteranceEnd` messages through the registered callbacks. An
//! `UtteranceEnd` is surfaced as an empty final result with
//! `is_speech_final` set, so the ingest side sees a uniform boundary signal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{client::IntoClientRequest, http::header::AUTHORIZATION, protocol::Message},
};
use tracing::{debug, info, warn};
use url::Url;

use super::SttFactory;
use super::base::{BaseStt, SttConfig, SttError, SttErrorCallback, SttResult, SttResultCallback};

const DEEPGRAM_LISTEN_URL: &str = "wss://api.deepgram.com/v1/listen";

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

#[derive(Default)]
struct Callbacks {
    result: Option<SttResultCallback>,
    error: Option<SttErrorCallback>,
}

pub struct DeepgramStt {
    config: SttConfig,
    sink: Option<WsSink>,
    read_task: Option<JoinHandle<()>>,
    callbacks: Arc<RwLock<Callbacks>>,
    connected: Arc<AtomicBool>,
}

impl DeepgramStt {
    pub fn new(config: SttConfig) -> Result<Self, SttError> {
        if config.api_key.is_empty() {
            return Err(SttError::ConfigurationError(
                "Deepgram API key is not set".to_string(),
            ));
        }
        Ok(Self {
            config,
            sink: None,
            read_task: None,
            callbacks: Arc::new(RwLock::new(Callbacks::default())),
            connected: Arc::new(AtomicBool::new(false)),
        })
    }

    fn build_url(&self) -> Result<Url, SttError> {
        let mut url = Url::parse(DEEPGRAM_LISTEN_URL)
            .map_err(|e| SttError::ConfigurationError(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("model", &self.config.model)
            .append_pair("language", &self.config.language)
            .append_pair("encoding", &self.config.encoding)
            .append_pair("sample_rate", &self.config.sample_rate.to_string())
            .append_pair("channels", &self.config.channels.to_string())
            .append_pair("punctuate", &self.config.punctuation.to_string())
            // utterance_end_ms requires interim results on the wire
            .append_pair("interim_results", "true")
            .append_pair("utterance_end_ms", &self.config.utterance_end_ms.to_string())
            .append_pair("vad_events", "true");
        Ok(url)
    }
}

/// Typed subset of Deepgram's `Results` message
#[derive(Debug, Deserialize)]
struct ResultsMessage {
    #[serde(default)]
    is_final: bool,
    #[serde(default)]
    speech_final: bool,
    channel: ChannelData,
}

#[derive(Debug, Deserialize)]
struct ChannelData {
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    confidence: f32,
}

async fn read_loop(mut source: WsSource, callbacks: Arc<RwLock<Callbacks>>, connected: Arc<AtomicBool>) {
    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => dispatch_message(&text, &callbacks).await,
            Ok(Message::Close(_)) => {
                debug!("Deepgram closed the transcription stream");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                // Streaming failures after connect are surfaced to the
                // session, which treats them as fatal
                let callback = callbacks.read().error.clone();
                if let Some(callback) = callback {
                    callback(SttError::NetworkError(e.to_string())).await;
                }
                break;
            }
        }
    }
    connected.store(false, Ordering::Release);
}

async fn dispatch_message(text: &str, callbacks: &Arc<RwLock<Callbacks>>) {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!("Unparseable Deepgram message: {}", e);
            return;
        }
    };

    match value.get("type").and_then(|t| t.as_str()) {
        Some("Results") => {
            let results: ResultsMessage = match serde_json::from_value(value) {
                Ok(results) => results,
                Err(e) => {
                    warn!("Malformed Deepgram Results message: {}", e);
                    return;
                }
            };
            let Some(alternative) = results.channel.alternatives.into_iter().next() else {
                return;
            };
            let result = SttResult::new(
                alternative.transcript,
                results.is_final,
                results.speech_final,
                alternative.confidence,
            );
            let callback = callbacks.read().result.clone();
            if let Some(callback) = callback {
                callback(result).await;
            }
        }
        Some("UtteranceEnd") => {
            // No transcript payload; signals the endpoint detector fired
            let callback = callbacks.read().result.clone();
            if let Some(callback) = callback {
                callback(SttResult::new(String::new(), true, true, 0.0)).await;
            }
        }
        Some("Error") => {
            let callback = callbacks.read().error.clone();
            if let Some(callback) = callback {
                callback(SttError::ProviderError(value.to_string())).await;
            }
        }
        // Metadata, SpeechStarted and friends carry nothing we consume
        _ => {}
    }
}

#[async_trait]
impl BaseStt for DeepgramStt {
    async fn connect(&mut self) -> Result<(), SttError> {
        let url = self.build_url()?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| SttError::ConnectionFailed(e.to_string()))?;
        let auth = format!("Token {}", self.config.api_key);
        request.headers_mut().insert(
            AUTHORIZATION,
            auth.parse().map_err(|_| {
                SttError::ConfigurationError(
                    "API key contains invalid header characters".to_string(),
                )
            })?,
        );

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| SttError::ConnectionFailed(e.to_string()))?;
        info!("Connected to Deepgram live transcription");

        let (sink, source) = stream.split();
        self.sink = Some(sink);
        self.connected.store(true, Ordering::Release);
        self.read_task = Some(tokio::spawn(read_loop(
            source,
            self.callbacks.clone(),
            self.connected.clone(),
        )));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), SttError> {
        self.connected.store(false, Ordering::Release);
        if let Some(mut sink) = self.sink.take() {
            let _ = sink.close().await;
        }
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn send_audio(&mut self, audio: Bytes) -> Result<(), SttError> {
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| SttError::ConnectionFailed("Not connected".to_string()))?;
        sink.send(Message::Binary(audio))
            .await
            .map_err(|e| SttError::AudioProcessingError(e.to_string()))
    }

    async fn finish(&mut self) -> Result<(), SttError> {
        if let Some(sink) = self.sink.as_mut() {
            sink.send(Message::Text(r#"{"type":"CloseStream"}"#.into()))
                .await
                .map_err(|e| SttError::NetworkError(e.to_string()))?;
        }
        Ok(())
    }

    async fn on_result(&mut self, callback: SttResultCallback) -> Result<(), SttError> {
        self.callbacks.write().result = Some(callback);
        Ok(())
    }

    async fn on_error(&mut self, callback: SttErrorCallback) -> Result<(), SttError> {
        self.callbacks.write().error = Some(callback);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "deepgram"
    }
}

impl Drop for DeepgramStt {
    fn drop(&mut self) {
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
    }
}

/// Builds one `DeepgramStt` per pipeline session from a shared config.
pub struct DeepgramSttFactory {
    config: SttConfig,
}

impl DeepgramSttFactory {
    pub fn new(config: SttConfig) -> Self {
        Self { config }
    }
}

impl SttFactory for DeepgramSttFactory {
    fn create(&self) -> Result<Box<dyn BaseStt>, SttError> {
        Ok(Box::new(DeepgramStt::new(self.config.clone())?))
    }
}
