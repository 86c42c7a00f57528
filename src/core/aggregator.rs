//! Turn aggregation: collecting finalized transcription segments into turns.

/// Accumulates finalized transcription segments between turn boundaries.
///
/// Owned exclusively by the ingest worker. The STT engine may deliver
/// results on its own tasks, but they are funneled back onto the ingest
/// worker before reaching the aggregator, so all access here is serialized
/// and no internal locking is needed.
#[derive(Debug, Default)]
pub struct TurnAggregator {
    segments: Vec<String>,
}

impl TurnAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interim hint. Does not touch the accumulator; returns the caption to
    /// forward for live captioning, if any.
    pub fn on_partial(&self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    /// Append one finalized segment to the current utterance. Whitespace-only
    /// segments are ignored.
    pub fn on_final_segment(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.segments.push(text.to_string());
        }
    }

    /// Atomically snapshot and clear the accumulator.
    ///
    /// Returns the completed turn text, or `None` when nothing accumulated
    /// since the last boundary (a boundary with an empty accumulator emits
    /// no turn).
    pub fn on_boundary(&mut self) -> Option<String> {
        if self.segments.is_empty() {
            return None;
        }
        let turn = self.segments.join(" ");
        self.segments.clear();
        Some(turn)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
