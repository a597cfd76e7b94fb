use mockito::{Matcher, Server};
use promptql_client::{
    AuthMode, ClientConfig, PollConfig, PromptQlClient, PromptQlError, ThreadApi, ThreadStatus,
};
use serde_json::json;
use std::io::Write;
use std::time::Duration;

const API_KEY: &str = "pql_test_api_key_123456";
const DDN_TOKEN: &str = "ddn_test_token_abcdef";

fn client_for(server: &Server) -> PromptQlClient {
    let config = ClientConfig::new(API_KEY, format!("{}/", server.url()), DDN_TOKEN)
        .with_request_timeout(Duration::from_secs(5));
    PromptQlClient::new(config).unwrap()
}

fn json_client_for(server: &Server) -> PromptQlClient {
    let config = ClientConfig::new(API_KEY, server.url(), DDN_TOKEN)
        .with_stream_status(false)
        .with_request_timeout(Duration::from_secs(5));
    PromptQlClient::new(config).unwrap()
}

#[tokio::test]
async fn test_start_thread_sends_message_and_credentials() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/start")
        .match_header("authorization", format!("Bearer {}", API_KEY).as_str())
        .match_body(Matcher::PartialJson(json!({
            "user_message": {"text": "What tables are available?"},
            "ddn_headers": {"Auth-Token": DDN_TOKEN},
            "timezone": "America/Los_Angeles",
            "system_instructions": "Answer briefly"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"thread_id":"thread-1","interaction_id":"int-1"}"#)
        .create_async()
        .await;

    let handle = client_for(&server)
        .start_thread_without_polling("What tables are available?", Some("Answer briefly"))
        .await
        .unwrap();

    assert_eq!(handle.thread_id, "thread-1");
    assert_eq!(handle.interaction_id.as_deref(), Some("int-1"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_private_auth_mode_header_name() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/start")
        .match_body(Matcher::PartialJson(json!({
            "ddn_headers": {"x-hasura-ddn-token": DDN_TOKEN}
        })))
        .with_status(200)
        .with_body(r#"{"thread_id":"thread-2"}"#)
        .create_async()
        .await;

    let config = ClientConfig::new(API_KEY, server.url(), DDN_TOKEN).with_auth_mode(AuthMode::Private);
    let handle = PromptQlClient::new(config)
        .unwrap()
        .start_thread_without_polling("hi", None)
        .await
        .unwrap();

    assert_eq!(handle.thread_id, "thread-2");
    assert!(handle.interaction_id.is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_start_thread_api_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/start")
        .with_status(500)
        .with_body("internal failure")
        .create_async()
        .await;

    let err = client_for(&server)
        .start_thread_without_polling("hi", None)
        .await
        .unwrap_err();

    match err {
        PromptQlError::Api { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "internal failure");
        }
        other => panic!("Expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_start_thread_missing_thread_id() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/start")
        .with_status(200)
        .with_body(r#"{"interaction_id":"int-1"}"#)
        .create_async()
        .await;

    let err = client_for(&server)
        .start_thread_without_polling("hi", None)
        .await
        .unwrap_err();

    assert!(matches!(err, PromptQlError::Protocol(_)));
}

#[tokio::test]
async fn test_connection_error() {
    let config = ClientConfig::new(API_KEY, "http://127.0.0.1:1", DDN_TOKEN)
        .with_request_timeout(Duration::from_secs(2));
    let err = PromptQlClient::new(config)
        .unwrap()
        .start_thread_without_polling("hi", None)
        .await
        .unwrap_err();

    assert!(matches!(err, PromptQlError::Connection(_)));
}

#[tokio::test]
async fn test_continue_thread_keeps_caller_thread_id() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/thread-1/continue")
        .match_body(Matcher::PartialJson(json!({"user_message": {"text": "And their sizes?"}})))
        .with_status(200)
        .with_body(r#"{"thread_id":"thread-other","interaction_id":"int-2"}"#)
        .create_async()
        .await;

    let handle = client_for(&server)
        .continue_thread_without_polling("thread-1", "And their sizes?", None)
        .await
        .unwrap();

    assert_eq!(handle.thread_id, "thread-1");
    assert_eq!(handle.interaction_id.as_deref(), Some("int-2"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_status_from_json_snapshot() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/thread-1")
        .match_header("accept", "application/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "thread_id": "thread-1",
                "interactions": [{
                    "interaction_id": "int-1",
                    "user_message": {"text": "hi"},
                    "assistant_actions": [{"action_id": "a1", "status": "processing"}]
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let report = json_client_for(&server).get_thread_status("thread-1").await.unwrap();

    assert_eq!(report.thread_id, "thread-1");
    assert_eq!(report.status, ThreadStatus::Processing);
    assert_eq!(report.state().interactions.len(), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_status_from_event_stream_uses_latest_snapshot() {
    let first = json!({
        "thread_id": "thread-1",
        "title": "draft",
        "version": 1,
        "thread_state": {"interactions": [{
            "interaction_id": "int-1",
            "assistant_actions": [{"action_id": "a1", "status": "processing"}]
        }]}
    });
    let second = json!({
        "thread_id": "thread-1",
        "title": "Available tables",
        "version": 2,
        "thread_state": {"interactions": [{
            "interaction_id": "int-1",
            "assistant_actions": [{"action_id": "a1", "status": "complete", "message": "Table A, Table B"}]
        }]}
    });
    let body = format!(
        "event: current-thread-state\ndata: {}\n\nevent: interaction-update\ndata: {{\"interaction_id\":\"int-1\"}}\n\nevent: current-thread-state\ndata: {}\n\n",
        first, second
    );

    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/thread-1")
        .match_header("accept", "text/event-stream")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let report = client_for(&server).get_thread_status("thread-1").await.unwrap();

    assert_eq!(report.status, ThreadStatus::Complete);
    assert_eq!(report.snapshot.title.as_deref(), Some("Available tables"));
    assert_eq!(report.snapshot.version, Some(json!(2)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_status_unknown_thread() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/missing")
        .with_status(404)
        .create_async()
        .await;

    let err = client_for(&server).get_thread_status("missing").await.unwrap_err();
    assert!(matches!(err, PromptQlError::NotFound(_)));
}

#[tokio::test]
async fn test_cancel_processing_thread() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/thread-1/cancel")
        .with_status(200)
        .with_body(r#"{"message":"Interaction cancelled"}"#)
        .create_async()
        .await;

    let result = client_for(&server).cancel_thread("thread-1").await.unwrap();

    assert_eq!(result.thread_id, "thread-1");
    assert_eq!(result.message, "Interaction cancelled");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_cancel_idle_thread_is_rejected() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/thread-1/cancel")
        .with_status(400)
        .with_body(r#"{"error":"thread is not processing"}"#)
        .create_async()
        .await;

    let err = client_for(&server).cancel_thread("thread-1").await.unwrap_err();

    assert_eq!(err.kind(), "cancel_rejected");
    assert_eq!(err.details(), Some(r#"{"error":"thread is not processing"}"#));
}

#[tokio::test]
async fn test_get_artifact_json_and_text() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/thread-1/artifacts/orders/data")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id":1,"total":9.5}]"#)
        .create_async()
        .await;
    server
        .mock("GET", "/thread-1/artifacts/notes/data")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("Revenue grew 4%")
        .create_async()
        .await;

    let client = client_for(&server);

    let orders = client.get_artifact("thread-1", "orders").await.unwrap();
    assert_eq!(orders.content_type.as_deref(), Some("application/json"));
    assert_eq!(orders.data, json!([{"id": 1, "total": 9.5}]));
    assert_eq!(orders.size, 22);

    let notes = client.get_artifact("thread-1", "notes").await.unwrap();
    assert_eq!(notes.data, json!("Revenue grew 4%"));
    assert_eq!(notes.size, 15);
}

#[tokio::test]
async fn test_get_unknown_artifact() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/thread-1/artifacts/nope/data")
        .with_status(404)
        .create_async()
        .await;

    let err = client_for(&server).get_artifact("thread-1", "nope").await.unwrap_err();

    assert!(matches!(err, PromptQlError::NotFound(_)));
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn test_start_thread_waits_for_completion() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/start")
        .with_status(200)
        .with_body(r#"{"thread_id":"thread-1","interaction_id":"int-1"}"#)
        .create_async()
        .await;
    let status = server
        .mock("GET", "/thread-1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"interactions": [{
                "interaction_id": "int-1",
                "assistant_actions": [{"status": "complete", "message": "Table A, Table B"}]
            }]})
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let poll = PollConfig::new()
        .with_timeout(Duration::from_secs(5))
        .with_interval(Duration::from_millis(10));
    let completed = json_client_for(&server)
        .start_thread("What tables are available?", None, &poll)
        .await
        .unwrap();

    assert_eq!(completed.thread_id, "thread-1");
    assert_eq!(completed.interaction_id.as_deref(), Some("int-1"));
    assert!(completed.state().is_complete());
    status.assert_async().await;
}

#[tokio::test]
async fn test_body_cut_after_success_is_protocol_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/thread-1/artifacts/orders/data")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_chunked_body(|w| {
            w.write_all(b"[{\"id\":1,")?;
            w.flush()?;
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "upstream went away",
            ))
        })
        .create_async()
        .await;

    let err = client_for(&server)
        .get_artifact("thread-1", "orders")
        .await
        .unwrap_err();

    assert!(matches!(err, PromptQlError::Protocol(_)), "got {:?}", err);
}
