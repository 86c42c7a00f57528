pub mod aggregator;
pub mod conversation;
pub mod docstore;
pub mod events;
pub mod ingest;
pub mod llm;
pub mod outbound;
pub mod session;
pub mod stt;
pub mod tts;

// Re-export commonly used items
pub use aggregator::TurnAggregator;
pub use conversation::{
    ConversationManager, ConversationState, FAILSOFT_APOLOGY, Phase, should_end_conversation,
};
pub use events::{ClientTextFrame, ControlSignal, InboundFrame, TranscriptEvent};
pub use ingest::{IngestWorker, SttFeed};
pub use outbound::{OutboundFrame, OutboundSink, OutgoingMessage};
pub use session::{SessionBackends, SessionError, SessionResult, run_session};
