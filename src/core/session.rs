//! Session lifecycle: starts the ingest worker and conversation manager,
//! owns the bounded turn event channel and the shared cancellation token,
//! and guarantees orderly teardown no matter which side exits first.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::conversation::ConversationManager;
use crate::core::docstore::DocumentStore;
use crate::core::events::{InboundFrame, TranscriptEvent};
use crate::core::ingest::{IngestWorker, SttFeed};
use crate::core::llm::ChatBackend;
use crate::core::outbound::OutboundSink;
use crate::core::stt::{BaseStt, SttError};
use crate::core::tts::{SpeechSynthesizer, TtsError};

/// Buffer between the STT engine's callback tasks and the ingest funnel
const STT_FEED_BUFFER: usize = 256;

/// The closed set of fatal error kinds that cross the coordinator boundary.
/// Transient failures (model calls, document uploads, malformed frames)
/// never appear here; they are fail-softed or dropped where they occur.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("STT engine error: {0}")]
    Stt(#[from] SttError),
    #[error("Speech synthesis error: {0}")]
    Synthesis(#[from] TtsError),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Turn event channel closed")]
    Channel,
    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Backend handles injected at session creation. No process-wide singletons;
/// the STT engine is per-session (it holds a live connection) while the rest
/// are shared.
pub struct SessionBackends {
    pub stt: Box<dyn BaseStt>,
    pub tts: Arc<dyn SpeechSynthesizer>,
    pub llm: Arc<dyn ChatBackend>,
    pub docstore: Arc<dyn DocumentStore>,
}

/// Run one complete pipeline session over an already-established transport.
///
/// `inbound_rx` delivers transport frames; `outbound` is the single ordered
/// stream back to the client. Both workers observe one cancellation token:
/// either side exiting, a fatal error, or the session timeout cancels it,
/// and the other side unwinds within the configured grace period.
pub async fn run_session(
    config: &ServerConfig,
    backends: SessionBackends,
    inbound_rx: mpsc::Receiver<InboundFrame>,
    outbound: OutboundSink,
) -> SessionResult<()> {
    let session_id = uuid::Uuid::new_v4();
    info!("Session {} starting", session_id);

    let cancel = CancellationToken::new();
    let (event_tx, event_rx) = mpsc::channel::<TranscriptEvent>(config.event_channel_capacity);

    let SessionBackends {
        mut stt,
        tts,
        llm,
        docstore,
    } = backends;

    // Funnel STT callback delivery onto the ingest task; the accumulator is
    // only ever touched there
    let (stt_tx, stt_rx) = mpsc::channel::<SttFeed>(STT_FEED_BUFFER);
    let result_tx = stt_tx.clone();
    stt.on_result(Arc::new(move |result| {
        let tx = result_tx.clone();
        Box::pin(async move {
            let _ = tx.send(SttFeed::Result(result)).await;
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    }))
    .await?;
    let fault_tx = stt_tx;
    stt.on_error(Arc::new(move |error| {
        let tx = fault_tx.clone();
        Box::pin(async move {
            let _ = tx.send(SttFeed::Fault(error)).await;
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    }))
    .await?;

    // Engine-connect failure is fatal before any turn is processed
    stt.connect().await?;

    let ingest = IngestWorker::new(
        stt,
        stt_rx,
        inbound_rx,
        event_tx,
        outbound.clone(),
        docstore,
        cancel.clone(),
    );
    let manager = ConversationManager::new(config, llm, tts, outbound, cancel.clone());

    let mut ingest_handle = tokio::spawn(ingest.run());
    let mut manager_handle = tokio::spawn(manager.run(event_rx));

    let timeout = tokio::time::sleep(Duration::from_secs(config.session_timeout_secs));
    tokio::pin!(timeout);

    let mut ingest_result: Option<SessionResult<()>> = None;
    let mut manager_result: Option<SessionResult<()>> = None;

    tokio::select! {
        result = &mut ingest_handle => {
            ingest_result = Some(flatten_join(result));
        }
        result = &mut manager_handle => {
            manager_result = Some(flatten_join(result));
        }
        _ = &mut timeout => {
            warn!(
                "Session {} hit the {}s timeout",
                session_id, config.session_timeout_secs
            );
        }
    }

    // Whichever path got us here, tear both sides down
    cancel.cancel();

    let grace = Duration::from_millis(config.shutdown_grace_ms);
    if ingest_result.is_none() {
        ingest_result = Some(join_with_grace("ingest", ingest_handle, grace).await);
    }
    if manager_result.is_none() {
        manager_result = Some(join_with_grace("conversation", manager_handle, grace).await);
    }

    let result = match (
        ingest_result.unwrap_or(Ok(())),
        manager_result.unwrap_or(Ok(())),
    ) {
        (Err(e), _) => Err(e),
        (_, Err(e)) => Err(e),
        _ => Ok(()),
    };

    match &result {
        Ok(()) => info!("Session {} finished", session_id),
        Err(e) => warn!("Session {} failed: {}", session_id, e),
    }
    result
}

/// Wait out the grace period for a worker to observe cancellation, then
/// abort it.
async fn join_with_grace<T>(
    name: &str,
    mut handle: JoinHandle<SessionResult<T>>,
    grace: Duration,
) -> SessionResult<()> {
    match tokio::time::timeout(grace, &mut handle).await {
        Ok(result) => flatten_join(result),
        Err(_) => {
            warn!("{} worker did not stop within the grace period, aborting", name);
            handle.abort();
            Ok(())
        }
    }
}

fn flatten_join<T>(result: Result<SessionResult<T>, JoinError>) -> SessionResult<()> {
    match result {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(SessionError::Worker(e.to_string())),
    }
}
