//! Speech output.
//!
//! [`SpeechSynth`] is the single speech-output channel; utterance completion
//! is reported back to the controller as a speech-finished event, which is
//! what drives the `Speaking → Listening`/`Ended` transitions.
//! [`EspeakSynth`] shells out to `espeak-ng`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};
use voltline_types::VoiceSettings;

use crate::controller::CallHandle;
use crate::error::CallError;

/// Maximum text input size per utterance (64 KiB).
const MAX_SYNTH_INPUT_BYTES: usize = 64 * 1024;

/// An utterance longer than this is killed and reported as finished so the
/// session cannot stall.
const SYNTH_TIMEOUT: Duration = Duration::from_secs(60);

/// How often the waiter polls the synthesis process for exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// espeak-ng's default speaking rate, in words per minute.
const ESPEAK_BASE_WPM: f32 = 175.0;

/// espeak-ng's default pitch on its 0-99 scale.
const ESPEAK_BASE_PITCH: f32 = 50.0;

/// One utterance to play to the caller.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    pub settings: VoiceSettings,
}

pub trait SpeechSynth: Send + Sync {
    /// Starts playing an utterance, replacing any current one. Completion is
    /// delivered as a speech-finished event, not via this call.
    fn speak(&self, utterance: Utterance) -> Result<(), CallError>;

    /// Stops any playing utterance. A cancelled utterance never reports
    /// completion.
    fn cancel(&self);
}

/// Synthesis via the `espeak-ng` CLI, playing to the default audio device.
///
/// Rate, pitch, and volume from [`VoiceSettings`] map onto espeak-ng's
/// `-s` (words/minute), `-p` (0-99), and `-a` (0-200) arguments; the
/// preferred-voice hint is passed as `-v` when set.
#[derive(Debug)]
pub struct EspeakSynth {
    binary: PathBuf,
    handle: CallHandle,
    /// Bumped on every speak/cancel; a waiter whose generation is stale
    /// stays silent.
    generation: Arc<AtomicU64>,
    /// The playing process. Lock acquisitions are brief operations that
    /// never span an await point.
    current: Arc<Mutex<Option<Child>>>,
}

impl EspeakSynth {
    pub fn new(binary: impl Into<PathBuf>, handle: CallHandle) -> Self {
        Self {
            binary: binary.into(),
            handle,
            generation: Arc::new(AtomicU64::new(0)),
            current: Arc::new(Mutex::new(None)),
        }
    }

    fn build_command(&self, utterance: &Utterance) -> Command {
        let settings = &utterance.settings;
        let wpm = (settings.rate * ESPEAK_BASE_WPM).clamp(80.0, 450.0) as u32;
        let pitch = (settings.pitch * ESPEAK_BASE_PITCH).clamp(0.0, 99.0) as u32;
        let amplitude = (settings.volume * 100.0).clamp(0.0, 200.0) as u32;

        let mut command = Command::new(&self.binary);
        command
            .arg("-s")
            .arg(wpm.to_string())
            .arg("-p")
            .arg(pitch.to_string())
            .arg("-a")
            .arg(amplitude.to_string());

        if let Some(voice) = &settings.preferred_voice {
            command.arg("-v").arg(voice);
        }

        command
            .arg(&utterance.text)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());
        command
    }
}

impl SpeechSynth for EspeakSynth {
    fn speak(&self, utterance: Utterance) -> Result<(), CallError> {
        if utterance.text.len() > MAX_SYNTH_INPUT_BYTES {
            return Err(CallError::Synthesis(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                utterance.text.len(),
                MAX_SYNTH_INPUT_BYTES
            )));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let mut command = self.build_command(&utterance);
        let child = command
            .spawn()
            .map_err(|e| CallError::Synthesis(format!("failed to spawn {:?}: {}", self.binary, e)))?;

        {
            let mut guard = self.current.lock().expect("synth lock poisoned");
            if let Some(mut previous) = guard.take() {
                let _ = previous.start_kill();
            }
            *guard = Some(child);
        }

        let current = Arc::clone(&self.current);
        let generations = Arc::clone(&self.generation);
        let handle = self.handle.clone();

        tokio::spawn(async move {
            let started = Instant::now();
            loop {
                let exited = {
                    let mut guard = current.lock().expect("synth lock poisoned");
                    if generations.load(Ordering::SeqCst) != generation {
                        // Superseded or cancelled; the child is no longer ours.
                        return;
                    }
                    match guard.as_mut().map(Child::try_wait) {
                        None => return, // cancelled
                        Some(Ok(Some(status))) => {
                            guard.take();
                            if !status.success() {
                                tracing::warn!(%status, "speech synthesis exited abnormally");
                            }
                            true
                        }
                        Some(Ok(None)) => false,
                        Some(Err(e)) => {
                            guard.take();
                            tracing::warn!(error = %e, "failed to wait for synthesis process");
                            true
                        }
                    }
                };

                if exited {
                    let _ = handle.speech_finished().await;
                    return;
                }

                if started.elapsed() > SYNTH_TIMEOUT {
                    let ours = {
                        let mut guard = current.lock().expect("synth lock poisoned");
                        if generations.load(Ordering::SeqCst) == generation {
                            if let Some(mut child) = guard.take() {
                                let _ = child.start_kill();
                            }
                            true
                        } else {
                            false
                        }
                    };
                    if ours {
                        tracing::warn!("speech synthesis timed out");
                        let _ = handle.speech_finished().await;
                    }
                    return;
                }

                tokio::time::sleep(EXIT_POLL_INTERVAL).await;
            }
        });

        Ok(())
    }

    fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.current.lock().expect("synth lock poisoned");
        if let Some(mut child) = guard.take() {
            let _ = child.start_kill();
        }
    }
}
