//! The pure call state machine.
//!
//! [`CallSession`] consumes discrete [`CallEvent`]s and returns the
//! [`Effect`]s the surrounding event loop must carry out. It performs no IO
//! itself, which keeps every transition unit-testable.
//!
//! Lifecycle: `Idle` → `Greeting` → `Listening` → (`AwaitingAnalysis` |
//! `Speaking`) → `Listening` … → `Ended`. A 180-second countdown runs only
//! while `Listening`. At most one analysis is in flight at a time; stale
//! results (arriving after a hang-up or reset) are discarded by sequence
//! number.

use std::fmt;

use uuid::Uuid;
use voltline_types::AnalysisOutcome;

use crate::config::CallConfig;
use crate::transcript::TranscriptBuffer;

/// Controller state. `Speaking` carries its continuation in
/// [`CallSession::after_speech`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Greeting,
    Listening,
    AwaitingAnalysis,
    Speaking,
    Ended,
}

/// What the conversation is currently trying to get out of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationStage {
    AwaitingIssue,
    AwaitingAddress,
}

/// Why a call ended. `Display` produces the user-visible reason string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    TimeLimit,
    HungUp,
    AddressRegistered,
    /// The analyzer judged the conversation not worth continuing; carries
    /// its stated reason.
    AnalyzerStopped(String),
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::TimeLimit => f.write_str("Time limit reached"),
            EndReason::HungUp => f.write_str("Call ended by user"),
            EndReason::AddressRegistered => {
                f.write_str("Address verified and complaint registered")
            }
            EndReason::AnalyzerStopped(reason) => f.write_str(reason),
        }
    }
}

/// What follows the current utterance once synthesis reports completion.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AfterSpeech {
    Resume,
    End(EndReason),
}

/// Discrete inputs to the state machine. Timer ticks, user actions, and
/// collaborator callbacks all arrive through this one type, preserving the
/// single-threaded ordering guarantee.
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// User starts (or restarts) a call.
    StartCall,
    /// User ends the call.
    HangUp,
    /// One second of wall time elapsed.
    Tick,
    /// Speech capture recognized a fragment.
    TranscriptUpdate(String),
    /// User signals the current turn is complete.
    SubmitTurn,
    /// The current utterance finished playing.
    SpeechFinished,
    /// Turn analysis resolved.
    AnalysisCompleted { seq: u64, outcome: AnalysisOutcome },
    /// Turn analysis failed (transport or parse).
    AnalysisFailed { seq: u64 },
}

/// Side effects the event loop must perform after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Speak(String),
    StartCapture,
    StopCapture,
    CancelSpeech,
    Analyze { seq: u64, text: String },
    /// The sole externally observable business output.
    AddressExtracted(String),
    CallEnded(EndReason),
}

/// One phone-call-like interaction, from start to end/reset.
#[derive(Debug)]
pub struct CallSession {
    id: Uuid,
    config: CallConfig,
    state: CallState,
    stage: ConversationStage,
    remaining_secs: u32,
    transcript: TranscriptBuffer,
    after_speech: AfterSpeech,
    /// Sequence number of the most recently issued analysis request.
    analysis_seq: u64,
    /// Sequence number of the in-flight request, if any.
    in_flight: Option<u64>,
    /// Deferred issue→address advance (policy variant).
    pending_stage_advance: bool,
    end_reason: Option<EndReason>,
}

impl CallSession {
    pub fn new(config: CallConfig) -> Self {
        let remaining = config.call_duration_secs;
        Self {
            id: Uuid::new_v4(),
            config,
            state: CallState::Idle,
            stage: ConversationStage::AwaitingIssue,
            remaining_secs: remaining,
            transcript: TranscriptBuffer::new(),
            after_speech: AfterSpeech::Resume,
            analysis_seq: 0,
            in_flight: None,
            pending_stage_advance: false,
            end_reason: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn stage(&self) -> ConversationStage {
        self.stage
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn end_reason(&self) -> Option<&EndReason> {
        self.end_reason.as_ref()
    }

    pub fn transcript_text(&self) -> String {
        self.transcript.text()
    }

    /// Applies one event and returns the effects to carry out, in order.
    pub fn apply(&mut self, event: CallEvent) -> Vec<Effect> {
        match event {
            CallEvent::StartCall => self.on_start_call(),
            CallEvent::HangUp => self.on_hang_up(),
            CallEvent::Tick => self.on_tick(),
            CallEvent::TranscriptUpdate(fragment) => {
                // Capture is suspended outside Listening; drop late callbacks.
                if self.state == CallState::Listening {
                    self.transcript.push(&fragment);
                }
                Vec::new()
            }
            CallEvent::SubmitTurn => self.on_submit_turn(),
            CallEvent::SpeechFinished => self.on_speech_finished(),
            CallEvent::AnalysisCompleted { seq, outcome } => self.on_analysis(seq, Some(outcome)),
            CallEvent::AnalysisFailed { seq } => self.on_analysis(seq, None),
        }
    }

    fn on_start_call(&mut self) -> Vec<Effect> {
        if !matches!(self.state, CallState::Idle | CallState::Ended) {
            return Vec::new();
        }

        self.id = Uuid::new_v4();
        self.state = CallState::Greeting;
        self.stage = ConversationStage::AwaitingIssue;
        self.remaining_secs = self.config.call_duration_secs;
        self.transcript.clear();
        self.in_flight = None;
        self.pending_stage_advance = false;
        self.end_reason = None;

        tracing::debug!(session = %self.id, "call started");

        vec![
            Effect::StopCapture,
            Effect::CancelSpeech,
            Effect::Speak(self.config.greeting.clone()),
        ]
    }

    fn on_hang_up(&mut self) -> Vec<Effect> {
        if matches!(self.state, CallState::Idle | CallState::Ended) {
            return Vec::new();
        }
        self.end(EndReason::HungUp)
    }

    fn on_tick(&mut self) -> Vec<Effect> {
        if self.state != CallState::Listening || self.remaining_secs == 0 {
            return Vec::new();
        }

        self.remaining_secs -= 1;
        if self.remaining_secs == 0 {
            return self.end(EndReason::TimeLimit);
        }
        Vec::new()
    }

    fn on_submit_turn(&mut self) -> Vec<Effect> {
        // Guard: only a non-empty turn submitted while listening is accepted.
        // Everything else (double taps, submits during speech or analysis)
        // is a no-op.
        if self.state != CallState::Listening {
            return Vec::new();
        }
        let text = self.transcript.text();
        if text.trim().is_empty() {
            return Vec::new();
        }

        self.transcript.clear();
        self.analysis_seq += 1;
        self.in_flight = Some(self.analysis_seq);
        self.state = CallState::AwaitingAnalysis;

        tracing::debug!(session = %self.id, seq = self.analysis_seq, "turn submitted");

        vec![
            Effect::StopCapture,
            Effect::Analyze {
                seq: self.analysis_seq,
                text,
            },
        ]
    }

    fn on_analysis(&mut self, seq: u64, outcome: Option<AnalysisOutcome>) -> Vec<Effect> {
        if self.state != CallState::AwaitingAnalysis || self.in_flight != Some(seq) {
            tracing::debug!(session = %self.id, seq, "stale analysis result discarded");
            return Vec::new();
        }
        self.in_flight = None;

        let outcome = match outcome {
            Some(outcome) => outcome,
            None => {
                // Analyzer failure: apologize and resume capture.
                self.transcript.clear();
                return self.speak_then(self.config.apology.clone(), AfterSpeech::Resume);
            }
        };

        let address = outcome
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        if let Some(address) = address {
            tracing::info!(session = %self.id, "address extracted, registering complaint");
            let next = if self.config.policy.end_on_confirmation {
                AfterSpeech::End(EndReason::AddressRegistered)
            } else {
                AfterSpeech::Resume
            };
            let mut effects = vec![Effect::AddressExtracted(address)];
            effects.extend(self.speak_then(self.config.confirmation.clone(), next));
            return effects;
        }

        self.transcript.clear();

        if !outcome.should_continue {
            // The analyzer judged the caller uncooperative; speak its reply
            // once, then end with its stated reason.
            return self.speak_then(
                outcome.response,
                AfterSpeech::End(EndReason::AnalyzerStopped(outcome.reason)),
            );
        }

        if self.stage == ConversationStage::AwaitingIssue {
            if self.config.policy.advance_stage_before_speaking {
                self.stage = ConversationStage::AwaitingAddress;
            } else {
                self.pending_stage_advance = true;
            }
        }

        self.speak_then(outcome.response, AfterSpeech::Resume)
    }

    fn on_speech_finished(&mut self) -> Vec<Effect> {
        match self.state {
            CallState::Greeting => {
                self.state = CallState::Listening;
                vec![Effect::StartCapture]
            }
            CallState::Speaking => {
                if self.pending_stage_advance {
                    self.stage = ConversationStage::AwaitingAddress;
                    self.pending_stage_advance = false;
                }
                match self.after_speech.clone() {
                    AfterSpeech::Resume => {
                        self.state = CallState::Listening;
                        vec![Effect::StartCapture]
                    }
                    AfterSpeech::End(reason) => self.end(reason),
                }
            }
            // Completion of an utterance we already cancelled.
            _ => Vec::new(),
        }
    }

    /// Transitions into `Speaking`. Cancels any playing utterance first so
    /// the system never hears itself.
    fn speak_then(&mut self, text: String, next: AfterSpeech) -> Vec<Effect> {
        self.state = CallState::Speaking;
        self.after_speech = next;
        vec![Effect::CancelSpeech, Effect::Speak(text)]
    }

    fn end(&mut self, reason: EndReason) -> Vec<Effect> {
        tracing::info!(session = %self.id, reason = %reason, "call ended");
        self.state = CallState::Ended;
        self.end_reason = Some(reason.clone());
        self.in_flight = None;
        self.pending_stage_advance = false;
        self.remaining_secs = self.config.call_duration_secs;
        vec![
            Effect::StopCapture,
            Effect::CancelSpeech,
            Effect::CallEnded(reason),
        ]
    }
}
