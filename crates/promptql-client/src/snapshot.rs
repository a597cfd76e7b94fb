// Normalizes both status encodings into one ThreadSnapshot

use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Response;
use serde_json::Value;

use crate::buffer_utils::{sse_events, SseEvent, SseEventStream};
use crate::error::{PromptQlError, Result};
use crate::types::{ThreadSnapshot, ThreadState};

pub const CURRENT_THREAD_STATE_EVENT: &str = "current-thread-state";

/// Status response body, tagged by wire encoding
pub enum ThreadPayload {
    Json(String),
    EventStream(SseEventStream),
}

impl ThreadPayload {
    /// Pick the encoding from the response's `Content-Type`
    pub async fn from_response(response: Response) -> Result<Self> {
        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("text/event-stream"))
            .unwrap_or(false);

        if is_event_stream {
            Ok(ThreadPayload::EventStream(sse_events(response)))
        } else {
            let body = response.text().await.map_err(|e| {
                PromptQlError::Protocol(format!("Failed to read thread state: {}", e))
            })?;
            Ok(ThreadPayload::Json(body))
        }
    }

    pub async fn into_snapshot(self) -> Result<ThreadSnapshot> {
        match self {
            ThreadPayload::Json(body) => snapshot_from_json(&body),
            ThreadPayload::EventStream(events) => latest_thread_state(events).await,
        }
    }
}

/// Parse a JSON status body, wrapped or bare
pub fn snapshot_from_json(body: &str) -> Result<ThreadSnapshot> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| PromptQlError::Protocol(format!("Failed to parse thread state: {}", e)))?;
    snapshot_from_value(value)
}

fn snapshot_from_value(value: Value) -> Result<ThreadSnapshot> {
    let Value::Object(map) = value else {
        return Err(PromptQlError::Protocol(
            "Thread state is not a JSON object".to_string(),
        ));
    };

    let wrapped = map.contains_key("thread_state") || map.contains_key("state");
    if wrapped {
        return serde_json::from_value(Value::Object(map))
            .map_err(|e| PromptQlError::Protocol(format!("Malformed thread snapshot: {}", e)));
    }

    let thread_id = map.get("thread_id").and_then(Value::as_str).map(str::to_string);
    let title = map.get("title").and_then(Value::as_str).map(str::to_string);
    let version = map.get("version").cloned();
    let thread_state: ThreadState = serde_json::from_value(Value::Object(map))
        .map_err(|e| PromptQlError::Protocol(format!("Malformed thread state: {}", e)))?;

    Ok(ThreadSnapshot {
        thread_id,
        title,
        version,
        thread_state,
    })
}

fn snapshot_from_event(event: &SseEvent) -> Result<ThreadSnapshot> {
    let value: Value = serde_json::from_str(&event.data).map_err(|e| {
        PromptQlError::Protocol(format!("Failed to parse {} event: {}", event.event, e))
    })?;
    snapshot_from_value(value)
}

/// Fold an event stream down to its last `current-thread-state` snapshot
///
/// A transport failure after at least one snapshot keeps that snapshot, since
/// the stream may be cut by the per-request timeout while still open.
pub async fn latest_thread_state(mut events: SseEventStream) -> Result<ThreadSnapshot> {
    let mut latest: Option<ThreadSnapshot> = None;

    while let Some(event) = events.next().await {
        let event = match event {
            Ok(event) => event,
            Err(err) => match latest {
                Some(snapshot) => {
                    tracing::warn!("Event stream ended early, using last snapshot: {}", err);
                    return Ok(snapshot);
                }
                None => return Err(err),
            },
        };

        if event.is(CURRENT_THREAD_STATE_EVENT) {
            latest = Some(snapshot_from_event(&event)?);
        } else {
            tracing::debug!("Ignoring '{}' event for state purposes", event.event);
        }
    }

    latest.ok_or_else(|| {
        PromptQlError::Protocol(format!(
            "Event stream contained no '{}' event",
            CURRENT_THREAD_STATE_EVENT
        ))
    })
}
