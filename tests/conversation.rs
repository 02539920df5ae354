//! Conversation turn integration tests
//!
//! Drive full turns over mock capabilities, transcription and audio.

use std::sync::Arc;
use std::time::Duration;

use allie::orchestrator::{CHAT_FAILURE, INVALID_SELECTION};
use allie::protocol::ScheduleResponse;
use allie::sports::{Game, TeamScore};
use allie::voice::{AudioCaptureSession, ModeSwitch, SpeechOutcome};
use allie::{
    Conversation, ConversationHistory, Error, PersonalityMode, ResponseOrchestrator, TurnOutcome,
    TurnRole, TurnState,
};
use chrono::{TimeZone, Utc};

mod common;
use common::{
    FakeMic, MockCapabilities, MockTranscriber, TimedOutput, conversation, option,
    speaking_conversation,
};

fn reply_text(outcome: &TurnOutcome) -> &str {
    match outcome {
        TurnOutcome::Replied { reply, .. } => &reply.text,
        other => panic!("expected a reply, got {other:?}"),
    }
}

/// Wait for `state`, then cancel the turn from another task
fn cancel_when(conv: &Conversation<FakeMic>, state: TurnState) -> tokio::task::JoinHandle<bool> {
    let mut rx = conv.subscribe();
    let canceller = conv.canceller();
    tokio::spawn(async move {
        rx.wait_for(|s| *s == state).await.unwrap();
        canceller.cancel()
    })
}

#[tokio::test]
async fn test_spoken_turn_reaches_chat_and_returns_to_idle() {
    let dir = tempfile::tempdir().unwrap();
    let caps = Arc::new(MockCapabilities::chatty("Hi there!"));
    let mut conv = conversation(caps.clone(), MockTranscriber::says("hello allie"), dir.path());

    assert_eq!(conv.state(), TurnState::Idle);
    conv.start_recording().unwrap();
    assert_eq!(conv.state(), TurnState::Recording);

    let outcome = conv.finish_turn().await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::Replied {
            transcript: "hello allie".to_string(),
            reply: allie::Reply::text("Hi there!"),
            speech: None,
        }
    );
    assert_eq!(conv.state(), TurnState::Idle);
    assert_eq!(caps.calls(), vec!["chat:hello allie"]);

    let history = conv.orchestrator().history().snapshot();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, TurnRole::User);
    assert_eq!(history[1].content, "Hi there!");
}

#[tokio::test]
async fn test_permission_denied_stays_idle() {
    let dir = tempfile::tempdir().unwrap();
    let capture = AudioCaptureSession::new(
        FakeMic { allowed: false },
        Arc::new(ModeSwitch::new()),
        dir.path(),
    );
    let orchestrator = ResponseOrchestrator::new(
        Arc::new(MockCapabilities::default()),
        ConversationHistory::new(),
    );
    let mut conv = Conversation::new(capture, MockTranscriber::says("hi"), orchestrator, "en");

    assert!(matches!(conv.start_recording(), Err(Error::PermissionDenied)));
    assert_eq!(conv.state(), TurnState::Idle);
}

#[tokio::test]
async fn test_finish_without_recording_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut conv = conversation(
        Arc::new(MockCapabilities::default()),
        MockTranscriber::says("hi"),
        dir.path(),
    );

    assert!(matches!(conv.finish_turn().await, Err(Error::NoActiveRecording)));
    assert_eq!(conv.state(), TurnState::Idle);
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut conv = conversation(
        Arc::new(MockCapabilities::default()),
        MockTranscriber::says("hi"),
        dir.path(),
    );

    conv.start_recording().unwrap();
    assert!(matches!(conv.start_recording(), Err(Error::AlreadyRecording)));
    assert!(conv.abort_recording());
    assert_eq!(conv.state(), TurnState::Idle);
}

#[tokio::test]
async fn test_transcription_failure_ends_turn_quietly() {
    let dir = tempfile::tempdir().unwrap();
    let caps = Arc::new(MockCapabilities::chatty("unused"));
    let mut conv = conversation(caps.clone(), MockTranscriber::failing(), dir.path());

    conv.start_recording().unwrap();
    let outcome = conv.finish_turn().await.unwrap();

    assert_eq!(outcome, TurnOutcome::NoTranscript);
    assert_eq!(conv.state(), TurnState::Idle);
    assert!(caps.calls().is_empty());
    assert!(conv.orchestrator().history().is_empty());
}

#[tokio::test]
async fn test_blank_transcript_is_no_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let caps = Arc::new(MockCapabilities::chatty("unused"));
    let mut conv = conversation(caps.clone(), MockTranscriber::says("   "), dir.path());

    conv.start_recording().unwrap();
    assert_eq!(conv.finish_turn().await.unwrap(), TurnOutcome::NoTranscript);
    assert!(caps.calls().is_empty());
}

#[tokio::test]
async fn test_cancel_during_transcription_drops_late_result() {
    let dir = tempfile::tempdir().unwrap();
    let caps = Arc::new(MockCapabilities::chatty("too late"));
    let mut conv = conversation(
        caps.clone(),
        MockTranscriber::slow("what's up", Duration::from_secs(10)),
        dir.path(),
    );

    conv.start_recording().unwrap();
    let cancel = cancel_when(&conv, TurnState::Transcribing);

    let outcome = tokio::time::timeout(Duration::from_secs(2), conv.finish_turn())
        .await
        .expect("cancel should end the turn promptly")
        .unwrap();

    assert!(cancel.await.unwrap());
    assert_eq!(outcome, TurnOutcome::Cancelled);
    assert_eq!(conv.state(), TurnState::Idle);
    assert!(caps.calls().is_empty());
    assert!(conv.orchestrator().history().is_empty());
}

#[tokio::test]
async fn test_cancel_during_dispatch_records_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let caps = Arc::new(MockCapabilities {
        chat_reply: Some("never heard".to_string()),
        chat_delay: Duration::from_secs(10),
        ..MockCapabilities::default()
    });
    let mut conv = conversation(caps.clone(), MockTranscriber::says("tell me a story"), dir.path());

    conv.start_recording().unwrap();
    let cancel = cancel_when(&conv, TurnState::Dispatching);

    let outcome = tokio::time::timeout(Duration::from_secs(2), conv.finish_turn())
        .await
        .expect("cancel should end the turn promptly")
        .unwrap();

    assert!(cancel.await.unwrap());
    assert_eq!(outcome, TurnOutcome::Cancelled);
    assert_eq!(conv.state(), TurnState::Idle);
    assert!(conv.orchestrator().history().is_empty());
}

#[tokio::test]
async fn test_clips_are_removed_after_each_turn() {
    let dir = tempfile::tempdir().unwrap();
    let caps = Arc::new(MockCapabilities::chatty("Hi there!"));
    let wav_count = || std::fs::read_dir(dir.path()).unwrap().count();

    let mut conv = conversation(caps.clone(), MockTranscriber::says("hello"), dir.path());
    for _ in 0..3 {
        conv.start_recording().unwrap();
        conv.finish_turn().await.unwrap();
    }
    assert_eq!(wav_count(), 0);

    let mut conv = conversation(caps.clone(), MockTranscriber::failing(), dir.path());
    conv.start_recording().unwrap();
    assert_eq!(conv.finish_turn().await.unwrap(), TurnOutcome::NoTranscript);
    assert_eq!(wav_count(), 0);

    let mut conv = conversation(
        caps,
        MockTranscriber::slow("late", Duration::from_secs(10)),
        dir.path(),
    );
    conv.start_recording().unwrap();
    let cancel = cancel_when(&conv, TurnState::Transcribing);
    assert_eq!(conv.finish_turn().await.unwrap(), TurnOutcome::Cancelled);
    assert!(cancel.await.unwrap());
    assert_eq!(wav_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_racing_cancel_always_settles_idle() {
    let dir = tempfile::tempdir().unwrap();

    for _ in 0..25 {
        let caps = Arc::new(MockCapabilities {
            chat_reply: Some("never heard".to_string()),
            chat_delay: Duration::from_secs(10),
            ..MockCapabilities::default()
        });
        let mut conv = conversation(caps, MockTranscriber::says("unused"), dir.path());

        // Fires at the first cancellable state, usually while routing
        let canceller = conv.canceller();
        let cancel = tokio::spawn(async move {
            while !canceller.cancel() {
                tokio::task::yield_now().await;
            }
        });

        let outcome = tokio::time::timeout(Duration::from_secs(2), conv.submit_text("hello"))
            .await
            .expect("cancel should end the turn promptly");
        cancel.await.unwrap();

        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert_eq!(conv.state(), TurnState::Idle);
    }
}

#[tokio::test]
async fn test_cancel_while_idle_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let conv = conversation(
        Arc::new(MockCapabilities::default()),
        MockTranscriber::says("hi"),
        dir.path(),
    );

    assert!(!conv.canceller().cancel());
    assert_eq!(conv.state(), TurnState::Idle);
}

#[tokio::test]
async fn test_reply_is_spoken_without_emoji() {
    let dir = tempfile::tempdir().unwrap();
    let output = TimedOutput::new(Duration::from_millis(10));
    let mut conv = speaking_conversation(
        Arc::new(MockCapabilities::chatty("Sure thing! 😊🎉")),
        MockTranscriber::says("can you help"),
        output.clone(),
        dir.path(),
    );

    conv.start_recording().unwrap();
    let outcome = conv.finish_turn().await.unwrap();

    let TurnOutcome::Replied { reply, speech, .. } = outcome else {
        panic!("expected a reply");
    };
    assert_eq!(reply.text, "Sure thing! 😊🎉");
    assert_eq!(speech, Some(SpeechOutcome::Finished));
    assert_eq!(*output.played.lock().unwrap(), vec!["Sure thing!"]);
    assert_eq!(conv.state(), TurnState::Idle);
}

#[tokio::test]
async fn test_cancel_during_speech_keeps_reply() {
    let dir = tempfile::tempdir().unwrap();
    let output = TimedOutput::new(Duration::from_secs(10));
    let mut conv = speaking_conversation(
        Arc::new(MockCapabilities::chatty("A very long answer")),
        MockTranscriber::says("explain everything"),
        output,
        dir.path(),
    );

    conv.start_recording().unwrap();
    let cancel = cancel_when(&conv, TurnState::Speaking);

    let outcome = tokio::time::timeout(Duration::from_secs(2), conv.finish_turn())
        .await
        .expect("cancel should stop speech promptly")
        .unwrap();

    assert!(cancel.await.unwrap());
    let TurnOutcome::Replied { speech, .. } = outcome else {
        panic!("expected a reply");
    };
    assert_eq!(speech, Some(SpeechOutcome::Cancelled));
    assert_eq!(conv.state(), TurnState::Idle);
    assert_eq!(conv.orchestrator().history().len(), 2);
}

#[tokio::test]
async fn test_chat_sends_prior_turns_and_mode() {
    let dir = tempfile::tempdir().unwrap();
    let caps = Arc::new(MockCapabilities::chatty("ok"));
    let mut conv = conversation(caps.clone(), MockTranscriber::says("unused"), dir.path());
    conv.orchestrator_mut().set_mode(PersonalityMode::Sassy);

    conv.submit_text("hello").await;
    conv.submit_text("how are you").await;

    let requests = caps.chat_requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].conversation_history.is_empty());
    assert_eq!(requests[1].prompt, "how are you");
    assert_eq!(requests[1].conversation_history.len(), 2);
    assert_eq!(requests[1].conversation_history[0].content, "hello");
    assert_eq!(requests[1].conversation_history[1].role, TurnRole::Assistant);
    assert_eq!(requests[1].mode, Some(PersonalityMode::Sassy));
}

#[tokio::test]
async fn test_switching_personality_speaks_intro() {
    let dir = tempfile::tempdir().unwrap();
    let output = TimedOutput::new(Duration::from_millis(5));
    let mut conv = speaking_conversation(
        Arc::new(MockCapabilities::default()),
        MockTranscriber::says("unused"),
        output.clone(),
        dir.path(),
    );

    let intro = conv.switch_personality(PersonalityMode::Humorous).await;

    assert_eq!(intro, PersonalityMode::Humorous.intro());
    assert_eq!(conv.orchestrator().mode(), PersonalityMode::Humorous);
    assert_eq!(*output.played.lock().unwrap(), vec![intro]);
    assert!(conv.orchestrator().history().is_empty());
    assert_eq!(conv.state(), TurnState::Idle);
}

#[tokio::test]
async fn test_end_session_forgets_everything() {
    let dir = tempfile::tempdir().unwrap();
    let caps = Arc::new(MockCapabilities::chatty("Sure."));
    caps.queue_schedule(ScheduleResponse {
        message: "Which one?".to_string(),
        options: Some(vec![option("a", "gym", None), option("b", "gym class", None)]),
    });
    let mut conv = conversation(caps, MockTranscriber::says("unused"), dir.path());

    conv.submit_text("hello").await;
    conv.submit_text("delete gym").await;
    conv.start_recording().unwrap();
    assert!(conv.orchestrator().has_pending_selection());

    conv.end_session();

    assert!(conv.orchestrator().history().is_empty());
    assert!(!conv.orchestrator().has_pending_selection());
    assert_eq!(conv.state(), TurnState::Idle);
    assert!(matches!(conv.finish_turn().await, Err(Error::NoActiveRecording)));
}

#[tokio::test]
async fn test_chat_failure_apologizes() {
    let dir = tempfile::tempdir().unwrap();
    let mut conv = conversation(
        Arc::new(MockCapabilities::default()),
        MockTranscriber::says("unused"),
        dir.path(),
    );

    let outcome = conv.submit_text("tell me a joke").await;
    assert_eq!(reply_text(&outcome), CHAT_FAILURE);
}

#[tokio::test]
async fn test_weather_routes_city() {
    let dir = tempfile::tempdir().unwrap();
    let caps = Arc::new(MockCapabilities::default());
    let mut conv = conversation(caps.clone(), MockTranscriber::says("unused"), dir.path());

    let outcome = conv.submit_text("What's the weather in Chicago?").await;
    assert_eq!(reply_text(&outcome), "It's 72°F in Chicago with clear sky.");
    assert_eq!(caps.calls(), vec!["weather:Chicago"]);
}

#[tokio::test]
async fn test_weather_failure_names_city() {
    let dir = tempfile::tempdir().unwrap();
    let caps = Arc::new(MockCapabilities {
        weather_fails: true,
        ..MockCapabilities::default()
    });
    let mut conv = conversation(caps, MockTranscriber::says("unused"), dir.path());

    let outcome = conv.submit_text("weather in Paris").await;
    assert_eq!(
        reply_text(&outcome),
        "Sorry, I couldn't get the weather for Paris right now."
    );
}

#[tokio::test]
async fn test_sports_formats_final_score() {
    let dir = tempfile::tempdir().unwrap();
    let caps = Arc::new(MockCapabilities {
        game: Some(Game {
            home_team: "Los Angeles Lakers".to_string(),
            away_team: "Boston Celtics".to_string(),
            commence_time: Utc.with_ymd_and_hms(2026, 3, 10, 2, 0, 0).unwrap(),
            completed: true,
            scores: vec![
                TeamScore {
                    name: "Los Angeles Lakers".to_string(),
                    score: "112".to_string(),
                },
                TeamScore {
                    name: "Boston Celtics".to_string(),
                    score: "108".to_string(),
                },
            ],
            odds: Vec::new(),
        }),
        ..MockCapabilities::default()
    });
    let mut conv = conversation(caps.clone(), MockTranscriber::says("unused"), dir.path());

    let outcome = conv.submit_text("what was the lakers score").await;
    assert_eq!(
        reply_text(&outcome),
        "Final: Los Angeles Lakers 112, Boston Celtics 108."
    );
    assert_eq!(caps.calls(), vec!["sports:lakers:scores"]);
}

#[tokio::test]
async fn test_delete_disambiguation_then_choice() {
    let dir = tempfile::tempdir().unwrap();
    let caps = Arc::new(MockCapabilities::default());
    caps.queue_schedule(ScheduleResponse {
        message: "I found 2 matches. Which one should I delete?".to_string(),
        options: Some(vec![
            option("a", "dentist", Some("tomorrow")),
            option("b", "dentist cleaning", None),
        ]),
    });
    let mut conv = conversation(caps.clone(), MockTranscriber::says("unused"), dir.path());

    let outcome = conv.submit_text("delete dentist").await;
    assert_eq!(
        reply_text(&outcome),
        "I found 2 matches. Which one should I delete? 1) dentist (tomorrow) 2) dentist cleaning"
    );
    assert!(conv.orchestrator().has_pending_selection());

    let outcome = conv.submit_text("2.").await;
    assert_eq!(reply_text(&outcome), "Deleted b.");
    assert!(!conv.orchestrator().has_pending_selection());
    assert_eq!(caps.calls(), vec!["schedule:delete dentist", "delete:b"]);
}

#[tokio::test]
async fn test_cancel_wording_awaits_choice() {
    let dir = tempfile::tempdir().unwrap();
    let caps = Arc::new(MockCapabilities::default());
    caps.queue_schedule(ScheduleResponse {
        message: "I found 2 matches. Which one should I delete?".to_string(),
        options: Some(vec![
            option("a", "dentist", None),
            option("b", "dentist cleaning", None),
        ]),
    });
    let mut conv = conversation(caps.clone(), MockTranscriber::says("unused"), dir.path());

    conv.submit_text("cancel the dentist on my schedule").await;
    assert!(conv.orchestrator().has_pending_selection());

    let outcome = conv.submit_text("2").await;
    assert_eq!(reply_text(&outcome), "Deleted b.");
    assert_eq!(
        caps.calls(),
        vec!["schedule:cancel the dentist on my schedule", "delete:b"]
    );
}

#[tokio::test]
async fn test_options_on_non_delete_command_still_await_choice() {
    let dir = tempfile::tempdir().unwrap();
    let caps = Arc::new(MockCapabilities::default());
    caps.queue_schedule(ScheduleResponse {
        message: "Which one?".to_string(),
        options: Some(vec![option("a", "gym", None), option("b", "gym class", None)]),
    });
    let mut conv = conversation(caps.clone(), MockTranscriber::says("unused"), dir.path());

    conv.submit_text("drop gym from my calendar").await;
    assert!(conv.orchestrator().has_pending_selection());

    let outcome = conv.submit_text("1").await;
    assert_eq!(reply_text(&outcome), "Deleted a.");
}

#[tokio::test]
async fn test_out_of_range_choice_deletes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let caps = Arc::new(MockCapabilities::default());
    caps.queue_schedule(ScheduleResponse {
        message: "I found 2 matches. Which one should I delete?".to_string(),
        options: Some(vec![option("a", "gym", None), option("b", "gym class", None)]),
    });
    let mut conv = conversation(caps.clone(), MockTranscriber::says("unused"), dir.path());

    conv.submit_text("remove gym").await;
    let outcome = conv.submit_text("5").await;

    assert_eq!(reply_text(&outcome), INVALID_SELECTION);
    assert!(!conv.orchestrator().has_pending_selection());
    assert_eq!(caps.calls(), vec!["schedule:remove gym"]);

    // "0" names no candidate either
    caps.queue_schedule(ScheduleResponse {
        message: "Which one?".to_string(),
        options: Some(vec![option("a", "gym", None), option("b", "gym class", None)]),
    });
    conv.submit_text("remove gym").await;
    let outcome = conv.submit_text("0").await;
    assert_eq!(reply_text(&outcome), INVALID_SELECTION);
}

#[tokio::test]
async fn test_pending_selection_expires_after_other_turn() {
    let dir = tempfile::tempdir().unwrap();
    let caps = Arc::new(MockCapabilities::chatty("Sure."));
    caps.queue_schedule(ScheduleResponse {
        message: "Which one?".to_string(),
        options: Some(vec![option("a", "gym", None), option("b", "gym class", None)]),
    });
    let mut conv = conversation(caps.clone(), MockTranscriber::says("unused"), dir.path());

    conv.submit_text("delete gym").await;
    conv.submit_text("never mind").await;
    assert!(!conv.orchestrator().has_pending_selection());

    // A bare number is now ordinary chat
    let outcome = conv.submit_text("1").await;
    assert_eq!(reply_text(&outcome), "Sure.");
    assert!(!caps.calls().iter().any(|c| c.starts_with("delete:")));
}

#[tokio::test]
async fn test_single_option_schedule_reply_sets_no_pending() {
    let dir = tempfile::tempdir().unwrap();
    let caps = Arc::new(MockCapabilities::default());
    caps.queue_schedule(ScheduleResponse {
        message: "Deleted \"gym\".".to_string(),
        options: None,
    });
    let mut conv = conversation(caps, MockTranscriber::says("unused"), dir.path());

    let outcome = conv.submit_text("delete gym").await;
    assert_eq!(reply_text(&outcome), "Deleted \"gym\".");
    assert!(!conv.orchestrator().has_pending_selection());
}

#[tokio::test]
async fn test_schedule_failure_apologizes() {
    let dir = tempfile::tempdir().unwrap();
    let mut conv = conversation(
        Arc::new(MockCapabilities::default()),
        MockTranscriber::says("unused"),
        dir.path(),
    );

    // No scripted response: the mock fails the call
    let outcome = conv.submit_text("remind me to stretch").await;
    assert_eq!(
        reply_text(&outcome),
        "Sorry, I couldn't reach your schedule right now."
    );
}
