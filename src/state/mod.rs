use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::docstore::{DocumentStore, OpenAiFileStore};
use crate::core::llm::{ChatBackend, OpenAiChat};
use crate::core::session::SessionBackends;
use crate::core::stt::{DeepgramSttFactory, SttConfig, SttError, SttFactory};
use crate::core::tts::{DeepgramTts, SpeechSynthesizer, TtsConfig};

/// Application state shared across handlers.
///
/// Backend handles are injected here once at startup and assembled per
/// session; nothing in the pipeline reaches for a process-wide client.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    stt_factory: Arc<dyn SttFactory>,
    tts: Arc<dyn SpeechSynthesizer>,
    llm: Arc<dyn ChatBackend>,
    docstore: Arc<dyn DocumentStore>,
}

impl AppState {
    /// Build state with the live provider bindings.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let client = reqwest::Client::new();

        let stt_config = SttConfig {
            api_key: config.deepgram_api_key.clone().unwrap_or_default(),
            model: config.stt_model.clone(),
            ..SttConfig::default()
        };
        let tts_config = TtsConfig {
            api_key: config.deepgram_api_key.clone().unwrap_or_default(),
            voice: config.tts_voice.clone(),
            ..TtsConfig::default()
        };
        let openai_key = config.openai_api_key.clone().unwrap_or_default();

        Arc::new(Self {
            stt_factory: Arc::new(DeepgramSttFactory::new(stt_config)),
            tts: Arc::new(DeepgramTts::new(client.clone(), tts_config)),
            llm: Arc::new(OpenAiChat::new(
                client.clone(),
                openai_key.clone(),
                config.llm_model.clone(),
            )),
            docstore: Arc::new(OpenAiFileStore::new(client, openai_key)),
            config,
        })
    }

    /// Build state with externally supplied backends (tests, alternate
    /// providers).
    pub fn with_backends(
        config: ServerConfig,
        stt_factory: Arc<dyn SttFactory>,
        tts: Arc<dyn SpeechSynthesizer>,
        llm: Arc<dyn ChatBackend>,
        docstore: Arc<dyn DocumentStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            stt_factory,
            tts,
            llm,
            docstore,
        })
    }

    /// Assemble the injected backend handles for one pipeline session.
    pub fn session_backends(&self) -> Result<SessionBackends, SttError> {
        Ok(SessionBackends {
            stt: self.stt_factory.create()?,
            tts: self.tts.clone(),
            llm: self.llm.clone(),
            docstore: self.docstore.clone(),
        })
    }
}
