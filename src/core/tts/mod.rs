pub mod base;
pub mod deepgram;

pub use base::{AudioStream, SpeechSynthesizer, TtsConfig, TtsError};
pub use deepgram::DeepgramTts;
