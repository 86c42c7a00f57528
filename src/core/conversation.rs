//! Conversation side of the pipeline: the sole consumer of the turn event
//! channel. Owns the message history, the end-of-conversation policy, the
//! memory window handed to the model, and the response path back out
//! (assistant text frame followed by streamed TTS audio).

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::core::docstore::DocumentRef;
use crate::core::events::{ControlSignal, TranscriptEvent};
use crate::core::llm::{ChatBackend, ChatMessage};
use crate::core::outbound::{OutboundFrame, OutboundSink, OutgoingMessage};
use crate::core::session::{SessionError, SessionResult};
use crate::core::tts::SpeechSynthesizer;

use futures::StreamExt;

static PUNCT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static FAREWELL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(goodbye|bye)$").unwrap());

/// Spoken back when a model call fails and debug replies are disabled.
pub const FAILSOFT_APOLOGY: &str =
    "Sorry, I ran into a problem answering that. Could you say that again?";

/// Whether `text` ends the conversation: after stripping punctuation,
/// collapsing whitespace and lowercasing, it must end with the whole word
/// "goodbye" or "bye".
pub fn should_end_conversation(text: &str) -> bool {
    let text = PUNCT_REGEX.replace_all(text, "");
    let text = WHITESPACE_REGEX.replace_all(&text, " ");
    let text = text.trim().to_lowercase();
    FAREWELL_REGEX.is_match(&text)
}

/// Per-session conversation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the next completed turn
    Listening,
    /// A turn arrived and is being evaluated
    TurnReady,
    /// Model call and speech synthesis are in flight
    Responding,
    /// Terminal: no further model calls or sends
    Ended,
}

/// Conversation state owned exclusively by the manager. Created at session
/// start, mutated once per completed turn, discarded at session end.
#[derive(Debug)]
pub struct ConversationState {
    messages: Vec<ChatMessage>,
    pending_document: Option<DocumentRef>,
    finished: bool,
    phase: Phase,
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            pending_document: None,
            finished: false,
            phase: Phase::Listening,
        }
    }

    /// Append a user message, consuming the pending document reference if
    /// one exists.
    pub fn push_user(&mut self, content: String) {
        let attachment = self.pending_document.take();
        self.messages
            .push(ChatMessage::user(content).with_attachment(attachment));
    }

    pub fn push_assistant(&mut self, content: String) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// Last-writer-wins single pending-document slot.
    pub fn set_pending_document(&mut self, document: DocumentRef) {
        self.pending_document = Some(document);
    }

    /// The last `n` messages, the slice sent to the model after the system
    /// prompt.
    pub fn window(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

/// The sole consumer of the turn event channel.
pub struct ConversationManager {
    state: ConversationState,
    llm: Arc<dyn ChatBackend>,
    tts: Arc<dyn SpeechSynthesizer>,
    outbound: OutboundSink,
    cancel: CancellationToken,
    system_prompt: String,
    memory_window: usize,
    debug_errors: bool,
}

impl ConversationManager {
    pub fn new(
        config: &ServerConfig,
        llm: Arc<dyn ChatBackend>,
        tts: Arc<dyn SpeechSynthesizer>,
        outbound: OutboundSink,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state: ConversationState::new(),
            llm,
            tts,
            outbound,
            cancel,
            system_prompt: config.system_prompt.clone(),
            memory_window: config.memory_window,
            debug_errors: config.debug_errors,
        }
    }

    /// Consume events until cancellation, channel close, or the
    /// end-of-conversation phrase. Returns the final conversation state.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<TranscriptEvent>,
    ) -> SessionResult<ConversationState> {
        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                TranscriptEvent::TurnComplete(text) => {
                    if self.handle_turn(text).await? {
                        break;
                    }
                }
                TranscriptEvent::Control(ControlSignal::Attach(document)) => {
                    debug!("Pending document set: {}", document);
                    self.state.set_pending_document(document);
                }
                TranscriptEvent::Control(ControlSignal::Disconnect) => {
                    // The peer is usually already gone; best effort only
                    let _ = self
                        .outbound
                        .send(OutboundFrame::Message(OutgoingMessage::Disconnect))
                        .await;
                }
                // Captions go straight from the ingest side to the
                // transport and never cross this channel
                TranscriptEvent::Interim(_) | TranscriptEvent::FinalSegment(_) => {
                    debug!("Ignoring caption event on the turn channel");
                }
            }
        }

        self.state.phase = Phase::Ended;
        Ok(self.state)
    }

    /// Process one completed turn. Returns `true` when the conversation is
    /// finished.
    async fn handle_turn(&mut self, text: String) -> SessionResult<bool> {
        self.state.phase = Phase::TurnReady;

        if should_end_conversation(&text) {
            info!("End-of-conversation phrase detected");
            self.state.finished = true;
            self.state.phase = Phase::Ended;
            // The terminating turn never reaches the model
            self.send(OutgoingMessage::Finish).await?;
            return Ok(true);
        }

        self.state.push_user(text);
        self.state.phase = Phase::Responding;

        let reply = self.model_reply().await;
        self.state.push_assistant(reply.clone());
        self.send(OutgoingMessage::Assistant {
            content: reply.clone(),
        })
        .await?;
        self.speak(&reply).await?;

        self.state.phase = Phase::Listening;
        Ok(false)
    }

    /// Call the model with the system prompt plus the windowed history.
    /// Failures are fail-soft: the reply text carries the error (debug mode)
    /// or a generic apology, and the session continues.
    async fn model_reply(&self) -> String {
        let window = self.state.window(self.memory_window);
        let mut request = Vec::with_capacity(window.len() + 1);
        request.push(ChatMessage::system(self.system_prompt.clone()));
        request.extend_from_slice(window);

        match self.llm.complete(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Model call failed, replying fail-soft: {}", e);
                if self.debug_errors {
                    e.to_string()
                } else {
                    FAILSOFT_APOLOGY.to_string()
                }
            }
        }
    }

    /// Synthesize the reply and stream the audio out. Synthesis and
    /// transport failures are fatal to the session.
    async fn speak(&self, text: &str) -> SessionResult<()> {
        let mut audio = self.tts.synthesize(text).await?;
        loop {
            let chunk = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                chunk = audio.next() => match chunk {
                    Some(chunk) => chunk?,
                    None => break,
                },
            };
            self.outbound
                .send(OutboundFrame::Audio(chunk))
                .await
                .map_err(|_| SessionError::Transport("outbound channel closed".to_string()))?;
        }
        Ok(())
    }

    async fn send(&self, message: OutgoingMessage) -> SessionResult<()> {
        self.outbound
            .send(OutboundFrame::Message(message))
            .await
            .map_err(|_| SessionError::Transport("outbound channel closed".to_string()))
    }
}
