//! Backend client tests against a mock relay

use std::time::Duration;

use allie::client::{BackendClient, Capabilities, Synthesizer, Transcriber};
use allie::protocol::{ChatRequest, HistoryMessage};
use allie::sports::StatType;
use allie::voice::{AudioClip, SpeechOptions, write_wav};
use allie::{Error, PersonalityMode, TurnRole};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn relay() -> (MockServer, BackendClient) {
    let server = MockServer::start().await;
    let client = BackendClient::new(&server.uri()).unwrap();
    (server, client)
}

fn clip(dir: &tempfile::TempDir) -> AudioClip {
    let path = dir.path().join("turn.wav");
    write_wav(&path, &[0.0, 0.5, -0.5, 0.25], 16000).unwrap();
    AudioClip {
        path,
        sample_rate: 16000,
        duration: Duration::from_millis(250),
    }
}

#[tokio::test]
async fn test_base_url_gets_trailing_slash() {
    let client = BackendClient::new("http://relay.local:3000").unwrap();
    assert_eq!(client.base_url().as_str(), "http://relay.local:3000/");
}

#[tokio::test]
async fn test_transcribe_uploads_clip() {
    let (server, client) = relay().await;
    Mock::given(method("POST"))
        .and(path("/api/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "hello allie" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let text = client.transcribe(&clip(&dir), "en").await.unwrap();
    assert_eq!(text, "hello allie");

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0].headers["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"file\""));
    assert!(body.contains("name=\"language\""));
}

#[tokio::test]
async fn test_transcribe_error_status() {
    let (server, client) = relay().await;
    Mock::given(path("/api/transcribe"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = client.transcribe(&clip(&dir), "en").await.unwrap_err();
    assert!(matches!(err, Error::TranscriptionFailed(_)));
}

#[tokio::test]
async fn test_weather_posts_city() {
    let (server, client) = relay().await;
    Mock::given(method("POST"))
        .and(path("/api/weather"))
        .and(body_json(json!({ "city": "Denver" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "It's 50°F in Denver." })))
        .mount(&server)
        .await;

    assert_eq!(client.weather("Denver").await.unwrap(), "It's 50°F in Denver.");
}

#[tokio::test]
async fn test_sports_stat_type_on_the_wire() {
    let (server, client) = relay().await;
    Mock::given(path("/api/sports"))
        .and(body_json(json!({ "team": "chiefs", "statType": "odds" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "game": null })))
        .mount(&server)
        .await;

    assert_eq!(client.sports("chiefs", StatType::Odds).await.unwrap(), None);
}

#[tokio::test]
async fn test_schedule_options_decode() {
    let (server, client) = relay().await;
    Mock::given(path("/api/schedule"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "I found 2 matches. Which one should I delete?",
            "options": [
                { "id": "a", "title": "dentist", "when": "friday" },
                { "id": "b", "title": "dentist bill" }
            ]
        })))
        .mount(&server)
        .await;

    let response = client.schedule("delete dentist").await.unwrap();
    let options = response.options.unwrap();
    assert_eq!(options.len(), 2);
    assert_eq!(options[0].label(), "dentist (friday)");
    assert_eq!(options[1].when, None);
}

#[tokio::test]
async fn test_delete_schedule_posts_id() {
    let (server, client) = relay().await;
    Mock::given(path("/api/schedule/delete"))
        .and(body_json(json!({ "id": "abc" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Deleted \"gym\"." })))
        .mount(&server)
        .await;

    let response = client.delete_schedule("abc").await.unwrap();
    assert_eq!(response.message, "Deleted \"gym\".");
    assert!(response.options.is_none());
}

#[tokio::test]
async fn test_chat_request_shape() {
    let (server, client) = relay().await;
    Mock::given(path("/api/smart"))
        .and(body_partial_json(json!({
            "prompt": "and tomorrow?",
            "conversationHistory": [{ "role": "user", "content": "hi" }],
            "mode": "humorous"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "Ha." })))
        .mount(&server)
        .await;

    let request = ChatRequest {
        prompt: "and tomorrow?".to_string(),
        conversation_history: vec![HistoryMessage {
            role: TurnRole::User,
            content: "hi".to_string(),
        }],
        mode: Some(PersonalityMode::Humorous),
        language: None,
    };
    assert_eq!(client.chat(&request).await.unwrap(), "Ha.");
}

#[tokio::test]
async fn test_error_status_is_downstream_failure() {
    let (server, client) = relay().await;
    Mock::given(path("/api/smart"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": { "code": "not_configured", "message": "chat is not configured" }
        })))
        .mount(&server)
        .await;

    let err = client
        .chat(&ChatRequest {
            prompt: "hi".to_string(),
            ..ChatRequest::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DownstreamCallFailed(_)));
}

#[tokio::test]
async fn test_synthesize_returns_bytes() {
    let (server, client) = relay().await;
    Mock::given(path("/api/synthesize"))
        .and(body_json(json!({ "text": "hello", "speed": 1.25 })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1_u8, 2, 3]))
        .mount(&server)
        .await;

    let options = SpeechOptions {
        speed: Some(1.25),
        ..SpeechOptions::default()
    };
    assert_eq!(client.synthesize("hello", &options).await.unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_synthesize_carries_voice_locale() {
    let (server, client) = relay().await;
    Mock::given(path("/api/synthesize"))
        .and(body_json(json!({ "text": "hola", "language": "es-MX" })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![9_u8]))
        .expect(1)
        .mount(&server)
        .await;

    let audio = client
        .synthesize("hola", &SpeechOptions::for_language("es"))
        .await
        .unwrap();
    assert_eq!(audio, vec![9]);
}

#[tokio::test]
async fn test_synthesize_error_is_tts() {
    let (server, client) = relay().await;
    Mock::given(path("/api/synthesize"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = client
        .synthesize("hello", &SpeechOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Tts(_)));
}
