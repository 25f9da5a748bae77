//! Turn analysis client.
//!
//! One request/response call per turn, no retries. Failures are surfaced to
//! the controller, which recovers by speaking an apology and resuming
//! capture.

use std::time::Duration;

use futures_util::future::BoxFuture;
use voltline_types::{AnalysisOutcome, AnalyzeRequest};

use crate::error::AnalyzerError;

/// Timeout for one analyze request.
const ANALYZE_TIMEOUT: Duration = Duration::from_secs(30);

/// Black-box turn analysis. The analyzer's own reasoning (address
/// extraction, cooperativeness judgment) is opaque; only this contract
/// matters to the controller.
pub trait Analyzer: Send + Sync + 'static {
    fn analyze(&self, text: String) -> BoxFuture<'static, Result<AnalysisOutcome, AnalyzerError>>;
}

/// Analyzer backed by `POST /api/analyze`.
#[derive(Debug, Clone)]
pub struct HttpAnalyzer {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpAnalyzer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(ANALYZE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Analyzer for HttpAnalyzer {
    fn analyze(&self, text: String) -> BoxFuture<'static, Result<AnalysisOutcome, AnalyzerError>> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();

        Box::pin(async move {
            let response = client
                .post(&endpoint)
                .json(&AnalyzeRequest { text })
                .send()
                .await
                .map_err(|e| AnalyzerError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(AnalyzerError::Transport(format!(
                    "analyze endpoint returned {}",
                    status
                )));
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| AnalyzerError::Transport(e.to_string()))?;

            serde_json::from_slice::<AnalysisOutcome>(&body)
                .map_err(|e| AnalyzerError::Parse(e.to_string()))
        })
    }
}
