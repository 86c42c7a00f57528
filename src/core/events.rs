//! Event vocabulary for the turn-taking pipeline.

use serde::Deserialize;

use crate::core::docstore::DocumentRef;

/// Events flowing through the pipeline.
///
/// Only `TurnComplete` and `Control` cross the turn event channel. `Interim`
/// and `FinalSegment` stay on the ingest side of the pipeline; interim text
/// is forwarded to the transport as a live caption, which is a side channel
/// rather than a pipeline input.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEvent {
    /// Interim transcription hint, advisory only.
    Interim(String),
    /// One finalized transcription segment.
    FinalSegment(String),
    /// A completed user turn, ready for the conversation side.
    TurnComplete(String),
    /// Out-of-band control signal.
    Control(ControlSignal),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlSignal {
    /// A document reference resolved by the upload task. Attached to the
    /// next completed user turn (last writer wins on the pending slot).
    Attach(DocumentRef),
    /// The client transport reached end-of-stream.
    Disconnect,
}

/// One frame read from the transport. Binary frames carry raw audio for the
/// STT engine, text frames carry control JSON or a pre-formed user turn.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    Audio(bytes::Bytes),
    Text(String),
}

/// Client-sent text frame.
///
/// `{"type": "attach", "content": <path>}` requests a document upload for
/// the conversation context; any other `{"content": <text>}` is treated as
/// an immediate completed turn, bypassing audio accumulation entirely.
#[derive(Debug, Deserialize)]
pub struct ClientTextFrame {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_frame_parsing() {
        let frame: ClientTextFrame =
            serde_json::from_str(r#"{"type": "attach", "content": "uploads/a.pdf"}"#).unwrap();
        assert_eq!(frame.kind.as_deref(), Some("attach"));
        assert_eq!(frame.content, "uploads/a.pdf");
    }

    #[test]
    fn test_plain_text_frame_parsing() {
        let frame: ClientTextFrame =
            serde_json::from_str(r#"{"content": "hello there"}"#).unwrap();
        assert!(frame.kind.is_none());
        assert_eq!(frame.content, "hello there");
    }

    #[test]
    fn test_missing_content_is_an_error() {
        assert!(serde_json::from_str::<ClientTextFrame>(r#"{"type": "attach"}"#).is_err());
    }
}
