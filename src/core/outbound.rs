//! Outbound transport vocabulary.
//!
//! JSON control frames and raw TTS audio share one ordered outbound stream;
//! a single writer task drains the sink so ordering is preserved between the
//! two kinds of traffic.

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;

/// JSON frames sent to the client.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    #[serde(rename = "assistant")]
    Assistant { content: String },
    #[serde(rename = "finish")]
    Finish,
    #[serde(rename = "transcript_interim")]
    TranscriptInterim { content: String },
    #[serde(rename = "transcript_final")]
    TranscriptFinal { content: String },
    #[serde(rename = "disconnect")]
    Disconnect,
    #[serde(rename = "error")]
    Error { message: String },
}

/// Route for outbound traffic: control messages or raw TTS audio chunks.
#[derive(Debug)]
pub enum OutboundFrame {
    Message(OutgoingMessage),
    Audio(Bytes),
}

/// Sending half of the single ordered outbound stream.
pub type OutboundSink = mpsc::Sender<OutboundFrame>;
