//! Unit tests for the pure call state machine.

use voltline_types::AnalysisOutcome;

use crate::config::{CallConfig, CallPolicy, DEFAULT_APOLOGY, DEFAULT_CONFIRMATION};
use crate::session::{CallEvent, CallSession, CallState, ConversationStage, Effect, EndReason};

fn session() -> CallSession {
    CallSession::new(CallConfig::default())
}

fn session_with_policy(policy: CallPolicy) -> CallSession {
    let config = CallConfig {
        policy,
        ..CallConfig::default()
    };
    CallSession::new(config)
}

/// Starts a call and completes the greeting, leaving the session Listening.
fn start_listening(session: &mut CallSession) {
    session.apply(CallEvent::StartCall);
    session.apply(CallEvent::SpeechFinished);
    assert_eq!(session.state(), CallState::Listening);
}

/// Pushes a transcript and submits the turn, returning the analysis seq.
fn submit(session: &mut CallSession, text: &str) -> u64 {
    session.apply(CallEvent::TranscriptUpdate(text.to_string()));
    let effects = session.apply(CallEvent::SubmitTurn);
    effects
        .iter()
        .find_map(|e| match e {
            Effect::Analyze { seq, .. } => Some(*seq),
            _ => None,
        })
        .expect("submit should issue an analysis request")
}

fn verdict(address: Option<&str>, should_continue: bool, response: &str) -> AnalysisOutcome {
    AnalysisOutcome {
        should_continue,
        address: address.map(str::to_string),
        reason: "test verdict".to_string(),
        response: response.to_string(),
    }
}

fn count_ended(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::CallEnded(_)))
        .count()
}

// ── call start and greeting ──────────────────────────────────────────

#[test]
fn start_call_speaks_greeting_then_listens() {
    let mut session = session();
    assert_eq!(session.state(), CallState::Idle);

    let effects = session.apply(CallEvent::StartCall);
    assert_eq!(session.state(), CallState::Greeting);
    assert_eq!(session.stage(), ConversationStage::AwaitingIssue);
    assert_eq!(session.remaining_secs(), 180);
    assert!(effects
        .iter()
        .any(|e| matches!(e, Effect::Speak(text) if text.contains("electricity complaint helpline"))));

    let effects = session.apply(CallEvent::SpeechFinished);
    assert_eq!(session.state(), CallState::Listening);
    assert!(effects.contains(&Effect::StartCapture));
}

#[test]
fn start_call_is_noop_mid_call() {
    let mut session = session();
    start_listening(&mut session);
    session.apply(CallEvent::TranscriptUpdate("hello".to_string()));

    let effects = session.apply(CallEvent::StartCall);
    assert!(effects.is_empty());
    assert_eq!(session.state(), CallState::Listening);
    assert_eq!(session.transcript_text(), "hello");
}

#[test]
fn start_call_resets_an_ended_session() {
    let mut session = session();
    start_listening(&mut session);
    submit(&mut session, "issue");
    session.apply(CallEvent::HangUp);
    assert_eq!(session.state(), CallState::Ended);

    session.apply(CallEvent::StartCall);
    assert_eq!(session.state(), CallState::Greeting);
    assert_eq!(session.stage(), ConversationStage::AwaitingIssue);
    assert_eq!(session.remaining_secs(), 180);
    assert!(session.end_reason().is_none());
    assert!(session.transcript_text().is_empty());
}

// ── timer ────────────────────────────────────────────────────────────

#[test]
fn timer_decrements_monotonically_and_ends_exactly_at_tick_180() {
    let mut session = session();
    start_listening(&mut session);

    let mut previous = session.remaining_secs();
    assert_eq!(previous, 180);

    for tick in 1..180 {
        let effects = session.apply(CallEvent::Tick);
        let now = session.remaining_secs();
        assert!(now < previous, "tick {} did not decrement", tick);
        previous = now;
        assert_eq!(count_ended(&effects), 0, "ended early at tick {}", tick);
        assert_eq!(session.state(), CallState::Listening);
    }
    assert_eq!(previous, 1);

    let effects = session.apply(CallEvent::Tick);
    assert_eq!(count_ended(&effects), 1);
    assert!(effects.contains(&Effect::CallEnded(EndReason::TimeLimit)));
    assert_eq!(session.state(), CallState::Ended);
    assert_eq!(session.end_reason().unwrap().to_string(), "Time limit reached");

    // Further ticks are no-ops; Ended fires exactly once.
    for _ in 0..5 {
        let effects = session.apply(CallEvent::Tick);
        assert!(effects.is_empty());
    }
}

#[test]
fn timer_runs_only_while_listening() {
    let mut session = session();

    session.apply(CallEvent::Tick);
    assert_eq!(session.remaining_secs(), 180);

    session.apply(CallEvent::StartCall);
    session.apply(CallEvent::Tick); // greeting still playing
    assert_eq!(session.remaining_secs(), 180);

    session.apply(CallEvent::SpeechFinished);
    session.apply(CallEvent::Tick);
    assert_eq!(session.remaining_secs(), 179);

    submit(&mut session, "no power on my street");
    session.apply(CallEvent::Tick); // analysis pending
    assert_eq!(session.remaining_secs(), 179);
}

#[test]
fn timer_is_reset_on_call_end_not_per_turn() {
    let mut session = session();
    start_listening(&mut session);
    session.apply(CallEvent::Tick);
    session.apply(CallEvent::Tick);
    assert_eq!(session.remaining_secs(), 178);

    // A full turn does not touch the countdown.
    let seq = submit(&mut session, "transformer sparking");
    session.apply(CallEvent::AnalysisCompleted {
        seq,
        outcome: verdict(None, true, "What is your address?"),
    });
    session.apply(CallEvent::SpeechFinished);
    assert_eq!(session.remaining_secs(), 178);

    session.apply(CallEvent::HangUp);
    assert_eq!(session.remaining_secs(), 180);
}

// ── submission guard ─────────────────────────────────────────────────

#[test]
fn submit_with_empty_transcript_is_noop() {
    let mut session = session();
    start_listening(&mut session);

    assert!(session.apply(CallEvent::SubmitTurn).is_empty());
    session.apply(CallEvent::TranscriptUpdate("   ".to_string()));
    assert!(session.apply(CallEvent::SubmitTurn).is_empty());
    assert_eq!(session.state(), CallState::Listening);
}

#[test]
fn submit_outside_listening_is_noop() {
    let mut session = session();

    session.apply(CallEvent::StartCall); // greeting playing
    assert!(session.apply(CallEvent::SubmitTurn).is_empty());
    assert_eq!(session.state(), CallState::Greeting);
}

#[test]
fn second_submit_while_analysis_pending_is_rejected() {
    let mut session = session();
    start_listening(&mut session);
    submit(&mut session, "pole is down");
    assert_eq!(session.state(), CallState::AwaitingAnalysis);

    // Late transcript fragments and duplicate submits are dropped.
    session.apply(CallEvent::TranscriptUpdate("more words".to_string()));
    assert!(session.apply(CallEvent::SubmitTurn).is_empty());
    assert_eq!(session.state(), CallState::AwaitingAnalysis);
    assert!(session.transcript_text().is_empty());
}

#[test]
fn submit_clears_the_transcript_and_freezes_capture() {
    let mut session = session();
    start_listening(&mut session);
    session.apply(CallEvent::TranscriptUpdate("my street light".to_string()));
    session.apply(CallEvent::TranscriptUpdate("is broken".to_string()));

    let effects = session.apply(CallEvent::SubmitTurn);
    assert!(effects.contains(&Effect::StopCapture));
    assert!(effects.iter().any(|e| matches!(
        e,
        Effect::Analyze { text, .. } if text == "my street light is broken"
    )));
    assert!(session.transcript_text().is_empty());
}

// ── analysis results ─────────────────────────────────────────────────

#[test]
fn address_result_surfaces_address_once_and_ends_after_confirmation() {
    let mut session = session();
    start_listening(&mut session);
    let seq = submit(&mut session, "123 Main Street");

    let effects = session.apply(CallEvent::AnalysisCompleted {
        seq,
        outcome: verdict(Some("123 Main Street"), false, "Thank you..."),
    });
    let surfaced: Vec<_> = effects
        .iter()
        .filter(|e| matches!(e, Effect::AddressExtracted(_)))
        .collect();
    assert_eq!(surfaced.len(), 1);
    assert!(effects.contains(&Effect::AddressExtracted("123 Main Street".to_string())));
    assert!(effects.contains(&Effect::Speak(DEFAULT_CONFIRMATION.to_string())));
    assert_eq!(session.state(), CallState::Speaking);

    let effects = session.apply(CallEvent::SpeechFinished);
    assert!(effects.contains(&Effect::CallEnded(EndReason::AddressRegistered)));
    assert_eq!(
        session.end_reason().unwrap().to_string(),
        "Address verified and complaint registered"
    );
}

#[test]
fn issue_stage_advances_once_then_stays() {
    let mut session = session();
    start_listening(&mut session);
    assert_eq!(session.stage(), ConversationStage::AwaitingIssue);

    let seq = submit(&mut session, "no electricity since morning");
    let effects = session.apply(CallEvent::AnalysisCompleted {
        seq,
        outcome: verdict(None, true, "Could you share your address?"),
    });
    assert!(effects.contains(&Effect::Speak("Could you share your address?".to_string())));
    assert_eq!(session.stage(), ConversationStage::AwaitingAddress);
    session.apply(CallEvent::SpeechFinished);

    // A second non-address turn keeps the stage where it is.
    let seq = submit(&mut session, "it is near the park");
    session.apply(CallEvent::AnalysisCompleted {
        seq,
        outcome: verdict(None, true, "Please tell me the street and number."),
    });
    assert_eq!(session.stage(), ConversationStage::AwaitingAddress);
    session.apply(CallEvent::SpeechFinished);
    assert_eq!(session.state(), CallState::Listening);
}

#[test]
fn analysis_failure_speaks_apology_and_resumes_listening() {
    let mut session = session();
    start_listening(&mut session);
    let seq = submit(&mut session, "flat 4, rose villa");

    let effects = session.apply(CallEvent::AnalysisFailed { seq });
    assert!(effects.contains(&Effect::Speak(DEFAULT_APOLOGY.to_string())));
    assert!(!effects
        .iter()
        .any(|e| matches!(e, Effect::AddressExtracted(_))));
    assert!(session.transcript_text().is_empty());

    let effects = session.apply(CallEvent::SpeechFinished);
    assert!(effects.contains(&Effect::StartCapture));
    assert_eq!(session.state(), CallState::Listening);
}

#[test]
fn uncooperative_verdict_ends_the_call_after_the_reply() {
    let mut session = session();
    start_listening(&mut session);
    let seq = submit(&mut session, "none of your business");

    let outcome = AnalysisOutcome {
        should_continue: false,
        address: None,
        reason: "Caller is uncooperative".to_string(),
        response: "I'm sorry, I can only help with address details. Goodbye.".to_string(),
    };
    let effects = session.apply(CallEvent::AnalysisCompleted { seq, outcome });
    assert!(effects
        .iter()
        .any(|e| matches!(e, Effect::Speak(text) if text.contains("Goodbye"))));
    assert_eq!(session.state(), CallState::Speaking);

    session.apply(CallEvent::SpeechFinished);
    assert_eq!(session.state(), CallState::Ended);
    assert_eq!(
        session.end_reason().unwrap().to_string(),
        "Caller is uncooperative"
    );
}

#[test]
fn blank_address_string_is_treated_as_no_address() {
    let mut session = session();
    start_listening(&mut session);
    let seq = submit(&mut session, "somewhere");

    let effects = session.apply(CallEvent::AnalysisCompleted {
        seq,
        outcome: verdict(Some("   "), true, "Could you repeat the address?"),
    });
    assert!(!effects
        .iter()
        .any(|e| matches!(e, Effect::AddressExtracted(_))));
    assert_eq!(session.stage(), ConversationStage::AwaitingAddress);
}

// ── cancellation and stale results ───────────────────────────────────

#[test]
fn hang_up_stops_capture_and_cancels_speech() {
    let mut session = session();
    start_listening(&mut session);

    let effects = session.apply(CallEvent::HangUp);
    assert!(effects.contains(&Effect::StopCapture));
    assert!(effects.contains(&Effect::CancelSpeech));
    assert!(effects.contains(&Effect::CallEnded(EndReason::HungUp)));
    assert_eq!(session.end_reason().unwrap().to_string(), "Call ended by user");
}

#[test]
fn hang_up_during_greeting_or_analysis_is_honored() {
    let mut session = session();
    session.apply(CallEvent::StartCall);
    let effects = session.apply(CallEvent::HangUp);
    assert_eq!(count_ended(&effects), 1);

    let mut session = self::session();
    start_listening(&mut session);
    submit(&mut session, "wires hanging low");
    let effects = session.apply(CallEvent::HangUp);
    assert_eq!(count_ended(&effects), 1);
}

#[test]
fn late_analysis_result_after_hang_up_is_discarded() {
    let mut session = session();
    start_listening(&mut session);
    let seq = submit(&mut session, "123 Main Street");
    session.apply(CallEvent::HangUp);

    let effects = session.apply(CallEvent::AnalysisCompleted {
        seq,
        outcome: verdict(Some("123 Main Street"), false, "Thank you..."),
    });
    assert!(effects.is_empty());
    assert_eq!(session.state(), CallState::Ended);
    assert_eq!(session.end_reason().unwrap().to_string(), "Call ended by user");
}

#[test]
fn analysis_result_for_a_previous_call_is_discarded() {
    let mut session = session();
    start_listening(&mut session);
    let stale_seq = submit(&mut session, "old turn");
    session.apply(CallEvent::HangUp);

    // New call, new turn in flight.
    session.apply(CallEvent::StartCall);
    session.apply(CallEvent::SpeechFinished);
    let live_seq = submit(&mut session, "new turn");
    assert_ne!(stale_seq, live_seq);

    let effects = session.apply(CallEvent::AnalysisCompleted {
        seq: stale_seq,
        outcome: verdict(Some("9 Stale Road"), false, "Thank you..."),
    });
    assert!(effects.is_empty());
    assert_eq!(session.state(), CallState::AwaitingAnalysis);
}

#[test]
fn stray_speech_finished_is_ignored() {
    let mut session = session();
    assert!(session.apply(CallEvent::SpeechFinished).is_empty());

    start_listening(&mut session);
    assert!(session.apply(CallEvent::SpeechFinished).is_empty());
    assert_eq!(session.state(), CallState::Listening);
}

// ── policy variants ──────────────────────────────────────────────────

#[test]
fn deferred_stage_advance_waits_for_the_utterance() {
    let mut session = session_with_policy(CallPolicy {
        end_on_confirmation: true,
        advance_stage_before_speaking: false,
    });
    start_listening(&mut session);

    let seq = submit(&mut session, "power cut in my lane");
    session.apply(CallEvent::AnalysisCompleted {
        seq,
        outcome: verdict(None, true, "Could you share your address?"),
    });
    assert_eq!(session.stage(), ConversationStage::AwaitingIssue);

    session.apply(CallEvent::SpeechFinished);
    assert_eq!(session.stage(), ConversationStage::AwaitingAddress);
    assert_eq!(session.state(), CallState::Listening);
}

#[test]
fn confirmation_without_end_resumes_listening() {
    let mut session = session_with_policy(CallPolicy {
        end_on_confirmation: false,
        advance_stage_before_speaking: true,
    });
    start_listening(&mut session);

    let seq = submit(&mut session, "123 Main Street");
    let effects = session.apply(CallEvent::AnalysisCompleted {
        seq,
        outcome: verdict(Some("123 Main Street"), false, "Thank you..."),
    });
    assert!(effects.contains(&Effect::AddressExtracted("123 Main Street".to_string())));

    let effects = session.apply(CallEvent::SpeechFinished);
    assert_eq!(count_ended(&effects), 0);
    assert!(effects.contains(&Effect::StartCapture));
    assert_eq!(session.state(), CallState::Listening);
}

// ── end-to-end scenario ──────────────────────────────────────────────

#[test]
fn full_intake_scenario_registers_the_complaint() {
    let mut session = session();

    session.apply(CallEvent::StartCall);
    session.apply(CallEvent::SpeechFinished);
    assert_eq!(session.state(), CallState::Listening);

    session.apply(CallEvent::TranscriptUpdate(
        "my street light is broken".to_string(),
    ));
    let seq = session
        .apply(CallEvent::SubmitTurn)
        .iter()
        .find_map(|e| match e {
            Effect::Analyze { seq, .. } => Some(*seq),
            _ => None,
        })
        .unwrap();

    let effects = session.apply(CallEvent::AnalysisCompleted {
        seq,
        outcome: verdict(None, true, "Could you please provide your address?"),
    });
    assert!(effects.contains(&Effect::Speak(
        "Could you please provide your address?".to_string()
    )));
    assert_eq!(session.stage(), ConversationStage::AwaitingAddress);
    assert!(session.transcript_text().is_empty());
    session.apply(CallEvent::SpeechFinished);

    session.apply(CallEvent::TranscriptUpdate("123 Main Street".to_string()));
    let seq = session
        .apply(CallEvent::SubmitTurn)
        .iter()
        .find_map(|e| match e {
            Effect::Analyze { seq, .. } => Some(*seq),
            _ => None,
        })
        .unwrap();

    let effects = session.apply(CallEvent::AnalysisCompleted {
        seq,
        outcome: verdict(Some("123 Main Street"), false, "Thank you..."),
    });
    assert!(effects.contains(&Effect::AddressExtracted("123 Main Street".to_string())));

    let effects = session.apply(CallEvent::SpeechFinished);
    assert!(effects.contains(&Effect::CallEnded(EndReason::AddressRegistered)));
    assert_eq!(
        session.end_reason().unwrap().to_string(),
        "Address verified and complaint registered"
    );
}
