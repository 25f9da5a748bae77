//! Call configuration.
//!
//! All fields have serde defaults so a partial TOML section (or an empty
//! one) yields the shipped helpline behavior.

use serde::{Deserialize, Serialize};
use voltline_types::VoiceSettings;

/// Seconds a call may spend listening before it is cut off.
pub const DEFAULT_CALL_DURATION_SECS: u32 = 180;

/// Spoken when a call starts.
pub const DEFAULT_GREETING: &str =
    "Hello, you've reached the electricity complaint helpline. How can I assist you today?";

/// Spoken when an address has been extracted, before the call ends.
pub const DEFAULT_CONFIRMATION: &str =
    "Thank you for providing your address. We'll send someone to help you shortly.";

/// Spoken when the analyze call fails; the caller is asked to repeat.
pub const DEFAULT_APOLOGY: &str =
    "Sorry, there was an error processing your address. Please try again.";

fn default_call_duration_secs() -> u32 {
    DEFAULT_CALL_DURATION_SECS
}

fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}

fn default_confirmation() -> String {
    DEFAULT_CONFIRMATION.to_string()
}

fn default_apology() -> String {
    DEFAULT_APOLOGY.to_string()
}

fn default_analyzer_url() -> String {
    "http://127.0.0.1:3000/api/analyze".to_string()
}

fn default_true() -> bool {
    true
}

/// Variant behaviors of the call state machine.
///
/// The helpline shipped two near-identical controller variants; the
/// differences are captured here as flags instead of parallel code paths.
/// Defaults are the canonical policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallPolicy {
    /// When true, the address confirmation suppresses resumed capture and
    /// the call ends once it has been spoken. When false, listening resumes
    /// after the confirmation and the caller must hang up.
    #[serde(default = "default_true")]
    pub end_on_confirmation: bool,

    /// When true, the issue→address stage advance happens as soon as the
    /// response utterance is queued ("advance once, then stay"). When false
    /// it is deferred until the utterance completes.
    #[serde(default = "default_true")]
    pub advance_stage_before_speaking: bool,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            end_on_confirmation: true,
            advance_stage_before_speaking: true,
        }
    }
}

/// Configuration for one conversation controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfig {
    /// Listening time budget per call, in seconds.
    #[serde(default = "default_call_duration_secs")]
    pub call_duration_secs: u32,

    /// Greeting spoken on call start.
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Confirmation spoken when an address is extracted.
    #[serde(default = "default_confirmation")]
    pub confirmation: String,

    /// Apology spoken when a turn analysis fails.
    #[serde(default = "default_apology")]
    pub apology: String,

    /// Endpoint for turn analysis.
    #[serde(default = "default_analyzer_url")]
    pub analyzer_url: String,

    /// Voice tuning for synthesized output.
    #[serde(default)]
    pub voice: VoiceSettings,

    /// Variant behavior flags.
    #[serde(default)]
    pub policy: CallPolicy,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            call_duration_secs: default_call_duration_secs(),
            greeting: default_greeting(),
            confirmation: default_confirmation(),
            apology: default_apology(),
            analyzer_url: default_analyzer_url(),
            voice: VoiceSettings::default(),
            policy: CallPolicy::default(),
        }
    }
}
