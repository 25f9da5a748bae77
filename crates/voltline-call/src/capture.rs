//! Speech capture.
//!
//! The controller only sees the [`SpeechCapture`] capability trait;
//! recognized text flows back to it as transcript events through the call
//! handle. [`SttCapture`] is the subprocess-backed implementation for
//! whisper.cpp-style transcribers.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::controller::CallHandle;
use crate::error::CallError;

/// Maximum audio input size per utterance (10 MiB). Prevents OOM from
/// oversized payloads.
const MAX_STT_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Timeout for STT process execution.
const STT_TIMEOUT: Duration = Duration::from_secs(120);

/// The single process-wide speech-capture device, as the controller sees it.
///
/// `start`/`stop` gate whether recognized text is delivered; the state
/// machine guarantees capture is never active while synthesis is playing.
pub trait SpeechCapture: Send + Sync {
    /// Capability probe: is speech recognition available here at all?
    fn is_supported(&self) -> bool;

    fn start(&self, continuous: bool) -> Result<(), CallError>;

    fn stop(&self);
}

/// Capture backed by a whisper.cpp-style binary reading audio from stdin and
/// writing the transcription to stdout.
#[derive(Debug)]
pub struct SttCapture {
    model_path: PathBuf,
    binary_path: PathBuf,
    handle: CallHandle,
    active: AtomicBool,
}

impl SttCapture {
    pub fn new(
        model_path: impl Into<PathBuf>,
        binary_path: impl Into<PathBuf>,
        handle: CallHandle,
    ) -> Self {
        Self {
            model_path: model_path.into(),
            binary_path: binary_path.into(),
            handle,
            active: AtomicBool::new(false),
        }
    }

    /// Feeds one chunk of caller audio through the transcriber and forwards
    /// the recognized text to the controller. Audio arriving while capture
    /// is stopped is dropped.
    pub async fn hear(&self, audio: &[u8]) -> Result<(), CallError> {
        if !self.active.load(Ordering::SeqCst) {
            return Ok(());
        }

        let text = self.transcribe(audio).await?;
        if text.is_empty() {
            return Ok(());
        }

        self.handle.push_transcript(text).await
    }

    async fn transcribe(&self, audio: &[u8]) -> Result<String, CallError> {
        if audio.len() > MAX_STT_INPUT_BYTES {
            return Err(CallError::Capture(format!(
                "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
                audio.len(),
                MAX_STT_INPUT_BYTES
            )));
        }

        let mut command = Command::new(&self.binary_path);
        command
            .arg("-m")
            .arg(&self.model_path)
            .arg("-f")
            .arg("-") // read from stdin
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| CallError::Capture(format!("failed to spawn STT binary: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CallError::Capture("failed to open stdin".to_string()))?;

        stdin
            .write_all(audio)
            .await
            .map_err(|e| CallError::Capture(format!("failed to write to stdin: {}", e)))?;
        drop(stdin); // close stdin to signal EOF

        let output = tokio::time::timeout(STT_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                CallError::Capture(format!(
                    "STT process timed out after {} seconds",
                    STT_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| CallError::Capture(format!("failed to read stdout: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CallError::Capture(format!("STT binary failed: {}", stderr)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl SpeechCapture for SttCapture {
    fn is_supported(&self) -> bool {
        self.binary_path.exists()
    }

    fn start(&self, _continuous: bool) -> Result<(), CallError> {
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}
