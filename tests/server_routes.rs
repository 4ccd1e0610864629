//! HTTP Surface Tests
//!
//! Start a real `RelayServer` on an auto-assigned port, wired to mock
//! upstreams, and exercise each route over HTTP.

use serde_json::{Value, json};
use voxrelay::config::RelayConfig;
use voxrelay::server::{AppState, RelayServer};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(upstream: &MockServer, with_keys: bool) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.gateway.base_url = format!("{}/v1", upstream.uri());
    config.speech.base_url = format!("{}/v1", upstream.uri());
    config.vector.url = upstream.uri();
    config.server.port = 0;
    if with_keys {
        config.gateway.api_key = "test-key".into();
        config.speech.api_key = "xi-test".into();
    }
    config
}

async fn start(config: &RelayConfig) -> (RelayServer, String) {
    let server = RelayServer::start(AppState::from_config(config), &config.server)
        .await
        .unwrap();
    let base = format!("http://{}", server.addr());
    (server, base)
}

#[tokio::test]
async fn test_health() {
    let upstream = MockServer::start().await;
    let (server, base) = start(&config_for(&upstream, true)).await;

    let body: Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "ok"}));
    server.shutdown().await;
}

#[tokio::test]
async fn test_streamed_completion_is_framed_as_events() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("data: A\ndata: B\ndata: [DONE]\n"))
        .expect(1)
        .mount(&upstream)
        .await;
    let (server, base) = start(&config_for(&upstream, true)).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/completions"))
        .json(&json!({"turns": [{"role": "user", "content": "hi"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_owned();
    assert!(content_type.starts_with("text/event-stream"));

    let text = response.text().await.unwrap();
    let a = text.find("data: A\n\n").unwrap();
    let b = text.find("data: B\n\n").unwrap();
    assert!(a < b);
    assert!(!text.contains("[DONE]"));
    server.shutdown().await;
}

#[tokio::test]
async fn test_one_shot_completion_returns_content() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello!"}}]
        })))
        .mount(&upstream)
        .await;
    let (server, base) = start(&config_for(&upstream, true)).await;

    let body: Value = reqwest::Client::new()
        .post(format!("{base}/completions"))
        .json(&json!({"turns": [{"role": "user", "content": "hi"}], "stream": false}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"content": "Hello!"}));
    server.shutdown().await;
}

#[tokio::test]
async fn test_completion_errors_map_to_status_codes() {
    let upstream = MockServer::start().await;
    let (server, base) = start(&config_for(&upstream, false)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/completions"))
        .json(&json!({"turns": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "EMPTY_REQUEST");

    let response = client
        .post(format!("{base}/completions"))
        .json(&json!({"turns": [{"role": "user", "content": "hi"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "CONFIG_MISSING");
    server.shutdown().await;
}

#[tokio::test]
async fn test_upstream_failure_is_bad_gateway() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&upstream)
        .await;
    let (server, base) = start(&config_for(&upstream, true)).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/completions"))
        .json(&json!({"turns": [{"role": "user", "content": "hi"}], "stream": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "UPSTREAM_FAILED");
    server.shutdown().await;
}

#[tokio::test]
async fn test_knowledge_base_snippets_feed_completion() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"embedding": [0.5, 0.5]}]})))
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/knowledge_items/points/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{"id": "k1", "payload": {"title": "Office", "text": "The office is in Room 4B."}}]
        })))
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "system", "content": "The office is in Room 4B."},
                {"role": "user", "content": "where is the office?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Room 4B."}}]
        })))
        .expect(1)
        .mount(&upstream)
        .await;
    let (server, base) = start(&config_for(&upstream, true)).await;

    let body: Value = reqwest::Client::new()
        .post(format!("{base}/completions"))
        .json(&json!({
            "turns": [{"role": "user", "content": "where is the office?"}],
            "use_knowledge_base": true,
            "stream": false
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["content"], "Room 4B.");
    server.shutdown().await;
}

#[tokio::test]
async fn test_speech_streams_audio() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/eleven_multilingual_v2/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3-audio".to_vec()))
        .expect(1)
        .mount(&upstream)
        .await;
    let (server, base) = start(&config_for(&upstream, true)).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/speech"))
        .json(&json!({"text": "say this"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "audio/mpeg");
    assert_eq!(
        response.headers()["content-disposition"],
        "inline; filename=speech.mp3"
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"ID3-audio");
    server.shutdown().await;
}

#[tokio::test]
async fn test_transcription_route_forwards_audio() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "transcribed"})))
        .expect(1)
        .mount(&upstream)
        .await;
    let (server, base) = start(&config_for(&upstream, true)).await;

    let client = reqwest::Client::new();
    let body: Value = client
        .post(format!("{base}/transcriptions"))
        .header("content-type", "audio/wav")
        .body(b"RIFF....WAVE".to_vec())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"text": "transcribed"}));

    let response = client
        .post(format!("{base}/transcriptions"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    server.shutdown().await;
}

#[tokio::test]
async fn test_knowledge_routes() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"embedding": [1.0, 0.0, 0.0]}]})))
        .mount(&upstream)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/knowledge_items"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&upstream)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/knowledge_items/points"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/knowledge_items/points/search"))
        .and(body_partial_json(json!({"limit": 2})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{"id": "abc", "payload": {"title": "Hit", "text": "body", "tags": ["t"]}}]
        })))
        .mount(&upstream)
        .await;
    let (server, base) = start(&config_for(&upstream, true)).await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("{base}/knowledge"))
        .json(&json!({"title": "T", "text": "hello world", "tags": ["x"]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created["title"], "T");
    assert_eq!(created["tags"], json!(["x"]));
    assert!(!created["id"].as_str().unwrap().is_empty());

    let remembered: Value = client
        .post(format!("{base}/knowledge/remember"))
        .json(&json!({
            "conversation_id": "c1",
            "turns": [{"role": "user", "content": "a"}, {"role": "assistant", "content": "b"}]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(remembered["title"], "Chat memory c1");
    assert_eq!(remembered["text"], "a\nb");

    let hits: Value = client
        .get(format!("{base}/knowledge/search"))
        .query(&[("query", "hello"), ("limit", "2")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(hits[0]["id"], "abc");
    assert_eq!(hits[0]["title"], "Hit");

    let response = client
        .get(format!("{base}/knowledge/search"))
        .query(&[("query", "  ")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    server.shutdown().await;
}
