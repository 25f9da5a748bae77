//! The event loop around the call state machine.
//!
//! All inputs — user actions, timer ticks, capture and synthesis callbacks,
//! analysis completions — arrive as [`CallEvent`]s on one mpsc channel and
//! are processed strictly in arrival order, so no two analysis requests or
//! utterances can ever overlap. Outputs go out over a broadcast channel;
//! an extracted address additionally invokes the caller-supplied callback.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use crate::analyzer::Analyzer;
use crate::capture::SpeechCapture;
use crate::config::CallConfig;
use crate::error::CallError;
use crate::session::{CallEvent, CallSession, Effect, EndReason};
use crate::synth::{SpeechSynth, Utterance};

/// Capacity of the inbound event queue.
const EVENT_QUEUE_CAPACITY: usize = 64;

/// Capacity of the outbound broadcast channel.
const OUTPUT_BROADCAST_CAPACITY: usize = 64;

/// Externally observable call outcomes.
#[derive(Debug, Clone)]
pub enum CallOutput {
    /// The sole business output: a verified mailing address for dispatch.
    AddressExtracted(String),
    Ended(EndReason),
}

/// Callback invoked exactly once per extracted address.
pub type AddressCallback = Box<dyn Fn(String) + Send + Sync>;

/// Cloneable sender half used by the surrounding application and by
/// capture/synthesis implementations to inject events.
#[derive(Debug, Clone)]
pub struct CallHandle {
    tx: mpsc::Sender<CallEvent>,
}

impl CallHandle {
    pub async fn start_call(&self) -> Result<(), CallError> {
        self.send(CallEvent::StartCall).await
    }

    pub async fn hang_up(&self) -> Result<(), CallError> {
        self.send(CallEvent::HangUp).await
    }

    pub async fn submit_turn(&self) -> Result<(), CallError> {
        self.send(CallEvent::SubmitTurn).await
    }

    /// Delivers a recognized transcript fragment from the capture device.
    pub async fn push_transcript(&self, text: impl Into<String>) -> Result<(), CallError> {
        self.send(CallEvent::TranscriptUpdate(text.into())).await
    }

    /// Reports utterance completion from the synthesis implementation.
    pub async fn speech_finished(&self) -> Result<(), CallError> {
        self.send(CallEvent::SpeechFinished).await
    }

    async fn send(&self, event: CallEvent) -> Result<(), CallError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| CallError::ChannelClosed)
    }
}

/// Creates the event channel a controller and its collaborators share.
///
/// The handle must exist before the controller because the capture and
/// synthesis implementations are constructed around it.
pub fn event_channel() -> (CallHandle, mpsc::Receiver<CallEvent>) {
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    (CallHandle { tx }, rx)
}

/// Drives one [`CallSession`] on a single task.
pub struct CallController {
    session: CallSession,
    config: CallConfig,
    handle: CallHandle,
    events: mpsc::Receiver<CallEvent>,
    capture: Arc<dyn SpeechCapture>,
    synth: Arc<dyn SpeechSynth>,
    analyzer: Arc<dyn Analyzer>,
    on_address: AddressCallback,
    outputs: broadcast::Sender<CallOutput>,
}

impl CallController {
    /// Builds a controller around an event channel from [`event_channel`].
    ///
    /// Fails with [`CallError::UnsupportedEnvironment`] when the capture
    /// probe reports speech recognition unavailable; callers surface that as
    /// a static "not supported" message and never start the loop.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: CallConfig,
        handle: CallHandle,
        events: mpsc::Receiver<CallEvent>,
        capture: Arc<dyn SpeechCapture>,
        synth: Arc<dyn SpeechSynth>,
        analyzer: Arc<dyn Analyzer>,
        on_address: AddressCallback,
    ) -> Result<Self, CallError> {
        if !capture.is_supported() {
            return Err(CallError::UnsupportedEnvironment);
        }

        let (outputs, _) = broadcast::channel(OUTPUT_BROADCAST_CAPACITY);
        let session = CallSession::new(config.clone());

        Ok(Self {
            session,
            config,
            handle,
            events,
            capture,
            synth,
            analyzer,
            on_address,
            outputs,
        })
    }

    /// Subscribes to call outputs. Subscribe before starting the call to
    /// avoid missing early events.
    pub fn subscribe_outputs(&self) -> broadcast::Receiver<CallOutput> {
        self.outputs.subscribe()
    }

    pub fn handle(&self) -> CallHandle {
        self.handle.clone()
    }

    /// Runs until every handle is dropped and the event channel closes.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        // The first tick of a tokio interval fires immediately; swallow it
        // so the first countdown decrement lands a full second in.
        ticker.tick().await;

        loop {
            let event = tokio::select! {
                _ = ticker.tick() => CallEvent::Tick,
                event = self.events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.dispatch(event).await;
        }

        tracing::debug!(session = %self.session.id(), "controller event channel closed");
    }

    async fn dispatch(&mut self, event: CallEvent) {
        let effects = self.session.apply(event);
        for effect in effects {
            self.perform(effect).await;
        }
    }

    async fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::Speak(text) => {
                let utterance = Utterance {
                    text,
                    settings: self.config.voice.clone(),
                };
                if let Err(e) = self.synth.speak(utterance) {
                    tracing::warn!(session = %self.session.id(), error = %e, "speech synthesis failed");
                    // Without a completion event the session would stall in
                    // Speaking; report the utterance as finished.
                    let _ = self.handle.tx.try_send(CallEvent::SpeechFinished);
                }
            }
            Effect::StartCapture => {
                if let Err(e) = self.capture.start(true) {
                    tracing::warn!(session = %self.session.id(), error = %e, "speech capture failed to start");
                }
            }
            Effect::StopCapture => self.capture.stop(),
            Effect::CancelSpeech => self.synth.cancel(),
            Effect::Analyze { seq, text } => {
                let analyzer = Arc::clone(&self.analyzer);
                let handle = self.handle.clone();
                tokio::spawn(async move {
                    let event = match analyzer.analyze(text).await {
                        Ok(outcome) => CallEvent::AnalysisCompleted { seq, outcome },
                        Err(e) => {
                            tracing::warn!(seq, error = %e, "turn analysis failed");
                            CallEvent::AnalysisFailed { seq }
                        }
                    };
                    let _ = handle.send(event).await;
                });
            }
            Effect::AddressExtracted(address) => {
                (self.on_address)(address.clone());
                let _ = self.outputs.send(CallOutput::AddressExtracted(address));
            }
            Effect::CallEnded(reason) => {
                let _ = self.outputs.send(CallOutput::Ended(reason));
            }
        }
    }
}
