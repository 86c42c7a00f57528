//! Ingest side of the pipeline: one logical task that reads transport
//! frames, feeds audio to the STT engine, and relays aggregator output into
//! the turn event channel.
//!
//! The STT engine delivers results on its own tasks; they are funneled back
//! here through an mpsc so the utterance accumulator is only ever touched
//! from this worker.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::aggregator::TurnAggregator;
use crate::core::docstore::DocumentStore;
use crate::core::events::{ClientTextFrame, ControlSignal, InboundFrame, TranscriptEvent};
use crate::core::outbound::{OutboundFrame, OutboundSink, OutgoingMessage};
use crate::core::session::{SessionError, SessionResult};
use crate::core::stt::{BaseStt, SttError, SttResult};

/// Serialized delivery of STT callback output onto the ingest task.
#[derive(Debug)]
pub enum SttFeed {
    Result(SttResult),
    Fault(SttError),
}

enum Step {
    Cancelled,
    Feed(Option<SttFeed>),
    Frame(Option<InboundFrame>),
}

pub struct IngestWorker {
    stt: Box<dyn BaseStt>,
    stt_rx: mpsc::Receiver<SttFeed>,
    inbound_rx: mpsc::Receiver<InboundFrame>,
    aggregator: TurnAggregator,
    events: mpsc::Sender<TranscriptEvent>,
    outbound: OutboundSink,
    docstore: Arc<dyn DocumentStore>,
    cancel: CancellationToken,
}

impl IngestWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stt: Box<dyn BaseStt>,
        stt_rx: mpsc::Receiver<SttFeed>,
        inbound_rx: mpsc::Receiver<InboundFrame>,
        events: mpsc::Sender<TranscriptEvent>,
        outbound: OutboundSink,
        docstore: Arc<dyn DocumentStore>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stt,
            stt_rx,
            inbound_rx,
            aggregator: TurnAggregator::new(),
            events,
            outbound,
            docstore,
            cancel,
        }
    }

    /// Run until cancellation, transport end-of-stream, or a fatal error.
    /// The STT engine is released on every exit path.
    pub async fn run(mut self) -> SessionResult<()> {
        let result = self.run_loop().await;

        if let Err(e) = self.stt.finish().await {
            debug!("STT finish failed during teardown: {}", e);
        }
        if let Err(e) = self.stt.disconnect().await {
            debug!("STT disconnect failed during teardown: {}", e);
        }

        result
    }

    async fn run_loop(&mut self) -> SessionResult<()> {
        loop {
            let step = tokio::select! {
                _ = self.cancel.cancelled() => Step::Cancelled,
                feed = self.stt_rx.recv() => Step::Feed(feed),
                frame = self.inbound_rx.recv() => Step::Frame(frame),
            };

            match step {
                Step::Cancelled => return Ok(()),
                Step::Feed(Some(SttFeed::Result(result))) => {
                    self.on_stt_result(result).await?;
                }
                Step::Feed(Some(SttFeed::Fault(error))) => {
                    return Err(SessionError::Stt(error));
                }
                // The engine dropped its callback senders; nothing more will
                // be transcribed
                Step::Feed(None) => return Ok(()),
                Step::Frame(Some(InboundFrame::Audio(chunk))) => {
                    self.stt
                        .send_audio(chunk)
                        .await
                        .map_err(SessionError::Stt)?;
                }
                Step::Frame(Some(InboundFrame::Text(text))) => {
                    self.on_text_frame(&text).await?;
                }
                Step::Frame(None) => {
                    info!("Transport reached end-of-stream");
                    self.emit(TranscriptEvent::Control(ControlSignal::Disconnect))
                        .await?;
                    return Ok(());
                }
            }
        }
    }

    async fn on_stt_result(&mut self, result: SttResult) -> SessionResult<()> {
        if result.is_final {
            self.aggregator.on_final_segment(&result.transcript);
            if !result.transcript.trim().is_empty() {
                self.send_caption(OutgoingMessage::TranscriptFinal {
                    content: result.transcript.trim().to_string(),
                })
                .await?;
            }
        } else if let Some(caption) = self.aggregator.on_partial(&result.transcript) {
            self.send_caption(OutgoingMessage::TranscriptInterim { content: caption })
                .await?;
        }

        if result.is_speech_final {
            if let Some(turn) = self.aggregator.on_boundary() {
                debug!("Turn boundary: {:?}", turn);
                self.emit(TranscriptEvent::TurnComplete(turn)).await?;
            }
        }
        Ok(())
    }

    async fn on_text_frame(&mut self, text: &str) -> SessionResult<()> {
        match serde_json::from_str::<ClientTextFrame>(text) {
            Ok(frame) if frame.kind.as_deref() == Some("attach") => {
                self.spawn_upload(frame.content);
            }
            Ok(frame) => {
                // A client-sent turn bypasses accumulation entirely
                let content = frame.content.trim();
                if !content.is_empty() {
                    self.emit(TranscriptEvent::TurnComplete(content.to_string()))
                        .await?;
                }
            }
            Err(e) => {
                warn!("Dropping malformed text frame: {}", e);
            }
        }
        Ok(())
    }

    /// Upload runs concurrently with both workers; its result re-enters the
    /// pipeline as a `Control(Attach)` event whenever it resolves.
    fn spawn_upload(&self, path: String) {
        let docstore = self.docstore.clone();
        let events = self.events.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let filename = Path::new(&path)
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("document")
                .to_string();

            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Failed to read attachment {}: {}", path, e);
                    return;
                }
            };

            let document = tokio::select! {
                _ = cancel.cancelled() => return,
                result = docstore.upload(bytes, &filename) => match result {
                    Ok(document) => document,
                    Err(e) => {
                        // Transient: the turn simply goes out without the document
                        warn!("Document upload failed: {}", e);
                        return;
                    }
                },
            };

            tokio::select! {
                _ = cancel.cancelled() => {}
                result = events.send(TranscriptEvent::Control(ControlSignal::Attach(document))) => {
                    if result.is_err() {
                        debug!("Conversation side gone before attach delivery");
                    }
                }
            }
        });
    }

    /// Send into the turn event channel. Bounded, so a stalled conversation
    /// side applies backpressure here instead of growing a queue.
    async fn emit(&self, event: TranscriptEvent) -> SessionResult<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Ok(()),
            result = self.events.send(event) => result.map_err(|_| SessionError::Channel),
        }
    }

    async fn send_caption(&self, message: OutgoingMessage) -> SessionResult<()> {
        self.outbound
            .send(OutboundFrame::Message(message))
            .await
            .map_err(|_| SessionError::Transport("outbound channel closed".to_string()))
    }
}
