//! Shared wire types for the Voltline helpline.
//!
//! These types define the contract between the conversation controller
//! (the caller of `POST /api/analyze`) and the analyze server. Field names
//! on the wire are camelCase to match the original client contract.

use serde::{Deserialize, Serialize};

pub mod voice;

pub use voice::VoiceSettings;

/// Request body for `POST /api/analyze`: the accumulated transcript of one
/// caller turn. Each turn is analyzed independently; no history is carried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
}

/// Structured verdict produced by the analyzer for one turn.
///
/// Only the analyzer creates this value; the controller reads it. `response`
/// is the text to speak back to the caller (the upstream prompt caps it at
/// 300 characters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    /// Whether the analyzer judges the conversation worth continuing.
    #[serde(rename = "shouldContinue")]
    pub should_continue: bool,
    /// The mailing address extracted from the turn, if any.
    pub address: Option<String>,
    /// The analyzer's stated reason for its verdict.
    pub reason: String,
    /// Reply text to speak to the caller.
    pub response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_outcome_uses_camel_case_wire_names() {
        let outcome = AnalysisOutcome {
            should_continue: true,
            address: None,
            reason: "caller cooperative".to_string(),
            response: "Could you share your address?".to_string(),
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["shouldContinue"], true);
        assert!(json["address"].is_null());
        assert_eq!(json["reason"], "caller cooperative");
    }

    #[test]
    fn analysis_outcome_round_trips_with_address() {
        let json = r#"{
            "shouldContinue": false,
            "address": "123 Main Street",
            "reason": "address provided",
            "response": "Thank you."
        }"#;

        let outcome: AnalysisOutcome = serde_json::from_str(json).unwrap();
        assert!(!outcome.should_continue);
        assert_eq!(outcome.address.as_deref(), Some("123 Main Street"));
    }

    #[test]
    fn analyze_request_serializes_text_field() {
        let req = AnalyzeRequest {
            text: "my street light is broken".to_string(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["text"], "my street light is broken");
    }
}
