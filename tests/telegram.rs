use std::time::Duration;

use campus_food_orders::{
    api::telegram::{TelegramClient, TelegramError},
    config::TelegramConfig,
};
use reqwest::Client;
use serde_json::json;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

fn client_for(server: &MockServer) -> TelegramClient {
    TelegramClient::new(
        Client::new(),
        TelegramConfig {
            bot_token: Some("123:abc".to_string()),
            api_url: server.uri(),
            admin_chat_id: None,
            timeout: Duration::from_secs(2),
        },
    )
}

#[tokio::test]
async fn send_message_posts_chat_and_text() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/bot123:abc/sendMessage"))
        .and(matchers::body_json(json!({
            "chat_id": 42,
            "text": "Your order #7 is ready for pickup at Chai Point!"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let sent = client_for(&server)
        .send_message(42, "Your order #7 is ready for pickup at Chai Point!")
        .await
        .unwrap();

    assert!(sent);
}

#[tokio::test]
async fn api_errors_are_reported() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_string(r#"{"ok":false,"description":"Bad Request: chat not found"}"#),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).send_message(42, "hi").await.unwrap_err();

    match err {
        TelegramError::Api { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("chat not found"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn notify_swallows_failures() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server).notify(Some(42), "hi").await;
}

#[tokio::test]
async fn notify_without_chat_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    client_for(&server).notify(None, "hi").await;
}
