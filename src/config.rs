use std::env;
use std::path::PathBuf;

/// Default system prompt sent ahead of the memory window on every model call.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful and enthusiastic assistant. \
Speak in a human, conversational tone. Keep your answers as short and concise as possible, \
like in a conversation, ideally no more than 120 characters.";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    pub deepgram_api_key: Option<String>,
    pub openai_api_key: Option<String>,

    /// Comma-separated allowed CORS origins, or "*" for any.
    pub allow_origins: String,

    /// Directory where uploaded documents are written before being pushed to
    /// the document store.
    pub upload_dir: PathBuf,

    /// Number of most recent conversation messages sent to the model per
    /// call. The system prompt is always prepended and is not counted.
    pub memory_window: usize,
    /// Capacity of the turn event channel. The ingest side blocks (never
    /// drops) when the conversation side falls behind.
    pub event_channel_capacity: usize,
    /// Upper bound on a single session's lifetime.
    pub session_timeout_secs: u64,
    /// How long the coordinator waits for the second worker after the first
    /// one exits, before aborting it.
    pub shutdown_grace_ms: u64,
    /// When true, fail-soft model errors are spoken back verbatim. When
    /// false, the user hears a generic apology instead.
    pub debug_errors: bool,

    pub system_prompt: String,
    pub llm_model: String,
    pub tts_voice: String,
    pub stt_model: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid port number: {e}"))?;

        let deepgram_api_key = env::var("DEEPGRAM_API_KEY").ok();
        let openai_api_key = env::var("OPENAI_API_KEY").ok();

        let allow_origins = env::var("ALLOW_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));

        let memory_window = env::var("MEMORY_WINDOW")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(10);
        let event_channel_capacity = env::var("EVENT_CHANNEL_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(32);
        let session_timeout_secs = env::var("SESSION_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(1800);
        let shutdown_grace_ms = env::var("SHUTDOWN_GRACE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(2000);
        let debug_errors = env::var("DEBUG_ERRORS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let system_prompt =
            env::var("SYSTEM_PROMPT").unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string());
        let llm_model = env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let tts_voice = env::var("TTS_VOICE").unwrap_or_else(|_| "aura-luna-en".to_string());
        let stt_model = env::var("STT_MODEL").unwrap_or_else(|_| "nova-2".to_string());

        Ok(ServerConfig {
            host,
            port,
            deepgram_api_key,
            openai_api_key,
            allow_origins,
            upload_dir,
            memory_window,
            event_channel_capacity,
            session_timeout_secs,
            shutdown_grace_ms,
            debug_errors,
            system_prompt,
            llm_model,
            tts_voice,
            stt_model,
        })
    }

    /// Get the full address string for binding
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            deepgram_api_key: None,
            openai_api_key: None,
            allow_origins: "*".to_string(),
            upload_dir: PathBuf::from("uploads"),
            memory_window: 10,
            event_channel_capacity: 32,
            session_timeout_secs: 1800,
            shutdown_grace_ms: 2000,
            debug_errors: false,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            llm_model: "gpt-4o".to_string(),
            tts_voice: "aura-luna-en".to_string(),
            stt_model: "nova-2".to_string(),
        }
    }
}
