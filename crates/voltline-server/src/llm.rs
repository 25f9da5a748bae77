//! Chat-completion client for turn analysis.
//!
//! Talks to an OpenAI-compatible `/chat/completions` endpoint. Each turn is
//! analyzed independently: one system prompt, one user message, no history.
//! The model is instructed to answer with a bare JSON verdict; this module
//! parses that verdict into an [`AnalysisOutcome`].

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use voltline_types::AnalysisOutcome;

/// Timeout for one completion request.
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);

/// The analysis instruction. The model is told to gather the caller's
/// address and nothing else, keep replies under 300 characters, and answer
/// with nothing but the JSON verdict.
const SYSTEM_PROMPT: &str = r#"You are an assistant analyzing one turn of an electricity complaint helpline call.
Your task is to:
1. Determine whether the caller seems uncooperative or intoxicated
2. Extract any address information mentioned
3. Assess whether the conversation should continue
4. Generate an appropriate response to keep the conversation going

You are only there to gather the caller's address, no matter what electricity problem they describe. If the caller is not answering, is drifting off topic, or appears malicious, end the conversation right away. Keep the response as short as possible and never exceed 300 characters.

Respond with JSON only, not a single character outside this format:
{
  "shouldContinue": boolean,
  "address": string | null,
  "reason": string,
  "response": string
}"#;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("chat completion request failed: {0}")]
    Transport(String),

    #[error("chat completion verdict could not be parsed: {0}")]
    Parse(String),
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Client for the upstream language model.
#[derive(Clone)]
pub struct ChatClient {
    api_base: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl ChatClient {
    pub fn new(
        api_base: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(COMPLETION_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            api_base: api_base.into(),
            model: model.into(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Analyzes one turn of conversation and returns the model's verdict.
    pub async fn analyze_conversation(&self, text: &str) -> Result<AnalysisOutcome, LlmError> {
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Transport(format!(
                "chat endpoint returned {}",
                status
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let content = body
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .ok_or_else(|| LlmError::Parse("completion had no content".to_string()))?;

        parse_verdict(content)
    }
}

/// Parses the model's JSON verdict, tolerating a markdown code fence around
/// it (some models wrap their output despite instructions).
pub(crate) fn parse_verdict(content: &str) -> Result<AnalysisOutcome, LlmError> {
    let trimmed = content.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.strip_suffix("```").unwrap_or(rest))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(inner).map_err(|e| LlmError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_verdict_accepts_bare_json() {
        let verdict = parse_verdict(
            r#"{"shouldContinue": true, "address": null, "reason": "issue noted", "response": "What is your address?"}"#,
        )
        .unwrap();
        assert!(verdict.should_continue);
        assert!(verdict.address.is_none());
    }

    #[test]
    fn parse_verdict_strips_code_fences() {
        let fenced = "```json\n{\"shouldContinue\": false, \"address\": \"123 Main Street\", \"reason\": \"address provided\", \"response\": \"Thank you.\"}\n```";
        let verdict = parse_verdict(fenced).unwrap();
        assert_eq!(verdict.address.as_deref(), Some("123 Main Street"));
        assert!(!verdict.should_continue);
    }

    #[test]
    fn parse_verdict_rejects_prose() {
        let err = parse_verdict("I could not find an address in that.").unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[test]
    fn debug_output_redacts_the_api_key() {
        let client = ChatClient::new("https://api.openai.com/v1", "gpt-3.5-turbo", "sk-secret");
        let debug = format!("{:?}", client);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-secret"));
    }
}
