mod common;

use bharat_ai::config::{RetryConfig, WebhookConfig};
use bharat_ai::models::{Message, Role};
use bharat_ai::providers::{ChatOutcome, ErrorType, ResponseService, WebhookBackend};
use common::ScriptedBackend;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test(start_paused = true)]
async fn test_overload_retries_three_times_with_doubling_delay() {
    let backend = Arc::new(ScriptedBackend::overloaded());
    let service = ResponseService::new(backend.clone());

    let started = tokio::time::Instant::now();
    let outcome = service
        .generate_chat_response("Namaste", &[], None)
        .await;

    assert_eq!(backend.calls(), 4);
    assert_eq!(started.elapsed(), Duration::from_secs(2 + 4 + 8));
    assert_eq!(outcome.error_type(), Some(ErrorType::Overload));
    assert!(outcome.message().contains("High Traffic"));
}

#[tokio::test]
async fn test_success_reply_is_trimmed_and_history_passed() {
    let backend = Arc::new(ScriptedBackend::replying(&["  Paris.  "], "French Capital"));
    let service = ResponseService::new(backend.clone());
    let history = vec![
        Message::new(Role::User, "Hello"),
        Message::new(Role::Assistant, "Namaste! How can I help?"),
    ];

    let outcome = service
        .generate_chat_response("What is the capital of France?", &history, None)
        .await;

    match outcome {
        ChatOutcome::Success(success) => {
            assert_eq!(success.message, "Paris.");
            assert_eq!(success.usage.total_tokens, 20);
        }
        ChatOutcome::Failure(failure) => panic!("unexpected failure: {:?}", failure),
    }
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_title_never_exceeds_fifty_characters() {
    let long_title = "A".repeat(80);
    let service = ResponseService::new(Arc::new(ScriptedBackend::replying(&[], &long_title)));
    let message = "Tell me everything about the monsoon season in Kerala and Goa";

    let title = service.generate_chat_title(message).await;

    assert!(title.chars().count() <= 50);
    assert_eq!(title, format!("{}...", &message[..47]));
}

#[tokio::test]
async fn test_empty_title_reply_falls_back_to_message_prefix() {
    let service = ResponseService::new(Arc::new(ScriptedBackend::replying(&[], "")));

    let title = service.generate_chat_title("Hello").await;

    assert_eq!(title, "Hello...");
}

#[tokio::test]
async fn test_empty_title_reply_uses_long_prefix_for_long_message() {
    let service = ResponseService::new(Arc::new(ScriptedBackend::replying(&[], "")));
    let message = "Explain the history of the Maratha empire in great detail please";

    let title = service.generate_chat_title(message).await;

    assert_eq!(title, "Explain the history of the Maratha empire in gr...");
    assert_eq!(title.chars().count(), 50);
}

#[tokio::test]
async fn test_webhook_overload_is_retried_then_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .expect(4)
        .mount(&server)
        .await;

    let backend = WebhookBackend::new(WebhookConfig {
        url: Some(server.uri()),
        retry: RetryConfig {
            max_retries: 3,
            base_delay_ms: 5,
        },
        ..WebhookConfig::default()
    })
    .unwrap();
    let service = ResponseService::new(Arc::new(backend));

    let outcome = service.generate_chat_response("Namaste", &[], None).await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.error_type(), Some(ErrorType::Overload));
    assert!(outcome
        .message()
        .starts_with("🚦 **I'm Currently Experiencing High Traffic**"));
}

#[tokio::test]
async fn test_webhook_auth_failure_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    let backend = WebhookBackend::new(WebhookConfig {
        url: Some(server.uri()),
        retry: RetryConfig {
            max_retries: 3,
            base_delay_ms: 5,
        },
        ..WebhookConfig::default()
    })
    .unwrap();
    let service = ResponseService::new(Arc::new(backend));

    let outcome = service.generate_chat_response("Namaste", &[], None).await;

    assert_eq!(outcome.error_type(), Some(ErrorType::Auth));
}
