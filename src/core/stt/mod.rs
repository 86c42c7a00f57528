pub mod base;
pub mod deepgram;

pub use base::{
    BaseStt, SttConfig, SttError, SttErrorCallback, SttResult, SttResultCallback,
};
pub use deepgram::{DeepgramStt, DeepgramSttFactory};

/// Factory for per-session STT engine instances.
///
/// A streaming engine holds a live connection, so every pipeline session
/// gets its own instance; the shared application state holds a factory
/// rather than an engine.
pub trait SttFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn BaseStt>, SttError>;
}
