//! # Conversation WebSocket Module
//!
//! WebSocket interface for live voice conversations. Each connection is one
//! session: binary frames carry caller audio into the recognizer, text frames
//! carry control messages, and the server streams captions, assistant text
//! and synthesized audio back on the same socket.
//!
//! ## WebSocket API
//!
//! ### Connection Flow
//! 1. Client connects to `/listen`
//! 2. Server connects the speech recognizer and begins accepting audio
//! 3. Client streams binary audio frames; the server replies with interim
//!    and final captions as speech is recognized
//! 4. On each completed turn the server sends the assistant reply as text
//!    followed by binary synthesized-audio frames
//! 5. A spoken farewell ends the conversation with a `finish` message
//!
//! ### Message Types
//!
//! **Incoming Messages:**
//! - **Binary frames** - Raw caller audio for transcription
//! - `{"type": "attach", "content": "uploads/sess_notes.txt"}` - Attach a
//!   previously uploaded document to the next turn
//! - `{"type": "text", "content": "Hello"}` - Inject a typed turn, bypassing
//!   speech recognition
//!
//! **Outgoing Messages:**
//! - `{"type": "transcript_interim", "content": "..."}` - Provisional caption
//! - `{"type": "transcript_final", "content": "..."}` - Finalized caption
//! - `{"type": "assistant", "content": "..."}` - Assistant reply text
//! - `{"type": "finish"}` - Conversation ended by a farewell
//! - `{"type": "disconnect"}` - Server acknowledges the client going away
//! - `{"type": "error", "message": "..."}` - Error occurred
//! - **Binary frames** - Synthesized assistant audio

pub mod handler;

pub use handler::ws_listen_handler;
