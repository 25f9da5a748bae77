//! Conversation controller for the Voltline helpline.
//!
//! Owns the call lifecycle: a caller starts a call, hears a synthesized
//! greeting, speaks, and submits turns; each turn is forwarded to the
//! analyze endpoint, whose verdict either keeps the conversation going or
//! ends the call with an extracted mailing address.
//!
//! The crate separates the pure state machine ([`CallSession`]) from the
//! event loop that drives it ([`CallController`]). Speech capture and
//! synthesis are injected capability traits so the controller can run
//! against subprocess-backed implementations in production and
//! channel-backed fakes in tests.

pub mod analyzer;
pub mod capture;
pub mod config;
pub mod controller;
pub mod error;
pub mod session;
pub mod synth;
pub mod transcript;

pub use analyzer::{Analyzer, HttpAnalyzer};
pub use capture::{SpeechCapture, SttCapture};
pub use config::{CallConfig, CallPolicy};
pub use controller::{AddressCallback, CallController, CallHandle, CallOutput};
pub use error::{AnalyzerError, CallError};
pub use session::{CallEvent, CallSession, CallState, ConversationStage, Effect, EndReason};
pub use synth::{EspeakSynth, SpeechSynth, Utterance};
pub use transcript::TranscriptBuffer;

#[cfg(test)]
mod tests;
