use thiserror::Error;

/// Failures of the analyze endpoint call. No retries are performed; the
/// controller recovers by speaking an apology and resuming capture.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("analyzer transport error: {0}")]
    Transport(String),

    #[error("analyzer response parse error: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum CallError {
    #[error("speech recognition is not supported in this environment")]
    UnsupportedEnvironment,

    #[error("speech capture error: {0}")]
    Capture(String),

    #[error("speech synthesis error: {0}")]
    Synthesis(String),

    #[error("controller event channel closed")]
    ChannelClosed,

    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
}
