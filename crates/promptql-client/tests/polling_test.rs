use async_trait::async_trait;
use promptql_client::{
    Artifact, CancelResult, PollConfig, PromptQlError, Result, ThreadApi, ThreadHandle,
    ThreadSnapshot, ThreadStatusReport, ThreadSummary,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Remote that reports `processing` until `complete_after` status fetches
struct ScriptedRemote {
    complete_after: usize,
    status_calls: AtomicUsize,
    fail_status: bool,
    continued: AtomicBool,
}

impl ScriptedRemote {
    fn completing_after(polls: usize) -> Self {
        Self {
            complete_after: polls,
            status_calls: AtomicUsize::new(0),
            fail_status: false,
            continued: AtomicBool::new(false),
        }
    }

    fn failing() -> Self {
        Self {
            complete_after: usize::MAX,
            status_calls: AtomicUsize::new(0),
            fail_status: true,
            continued: AtomicBool::new(false),
        }
    }

    fn calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

fn first_interaction(done: bool) -> serde_json::Value {
    let action = if done {
        json!({"action_id": "a1", "status": "complete", "message": "Table A, Table B"})
    } else {
        json!({"action_id": "a1", "status": "processing"})
    };
    json!({
        "interaction_id": "int-1",
        "user_message": {"text": "What tables are available?"},
        "assistant_actions": [action]
    })
}

fn snapshot(done: bool) -> ThreadSnapshot {
    serde_json::from_value(json!({
        "thread_id": "thread-1",
        "thread_state": {"interactions": [first_interaction(done)]}
    }))
    .unwrap()
}

/// Follow-up turn; until `done` the server still shows only the finished first turn
fn continued_snapshot(done: bool) -> ThreadSnapshot {
    let interactions = if done {
        json!([
            first_interaction(true),
            {
                "interaction_id": "int-2",
                "user_message": {"text": "And their sizes?"},
                "assistant_actions": [{"action_id": "a2", "status": "complete", "message": "A: 10 rows, B: 20 rows"}]
            }
        ])
    } else {
        json!([first_interaction(true)])
    };
    serde_json::from_value(json!({
        "thread_id": "thread-1",
        "thread_state": {"interactions": interactions}
    }))
    .unwrap()
}

#[async_trait]
impl ThreadApi for ScriptedRemote {
    async fn start_thread_without_polling(
        &self,
        _message: &str,
        _system_instructions: Option<&str>,
    ) -> Result<ThreadHandle> {
        Ok(ThreadHandle {
            thread_id: "thread-1".to_string(),
            interaction_id: Some("int-1".to_string()),
        })
    }

    async fn continue_thread_without_polling(
        &self,
        thread_id: &str,
        _message: &str,
        _system_instructions: Option<&str>,
    ) -> Result<ThreadHandle> {
        self.continued.store(true, Ordering::SeqCst);
        Ok(ThreadHandle {
            thread_id: thread_id.to_string(),
            interaction_id: Some("int-2".to_string()),
        })
    }

    async fn get_thread_status(&self, thread_id: &str) -> Result<ThreadStatusReport> {
        let call = self.status_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_status {
            return Err(PromptQlError::Connection("connection reset".to_string()));
        }
        let done = call >= self.complete_after;
        let snapshot = if self.continued.load(Ordering::SeqCst) {
            continued_snapshot(done)
        } else {
            snapshot(done)
        };
        Ok(ThreadStatusReport::from_snapshot(thread_id, snapshot))
    }

    async fn cancel_thread(&self, thread_id: &str) -> Result<CancelResult> {
        Err(PromptQlError::CancelRejected {
            thread_id: thread_id.to_string(),
            body: String::new(),
        })
    }

    async fn get_artifact(&self, _thread_id: &str, artifact_id: &str) -> Result<Artifact> {
        Err(PromptQlError::NotFound(format!("Artifact {}", artifact_id)))
    }
}

fn fast_poll() -> PollConfig {
    PollConfig::new()
        .with_timeout(Duration::from_secs(5))
        .with_interval(Duration::from_millis(5))
}

#[tokio::test]
async fn test_start_thread_completes_after_two_polls() {
    let remote = ScriptedRemote::completing_after(2);

    let completed = remote
        .start_thread("What tables are available?", None, &fast_poll())
        .await
        .unwrap();

    assert_eq!(remote.calls(), 2);
    assert_eq!(completed.thread_id, "thread-1");

    let summary = ThreadSummary::from_state(completed.state());
    assert_eq!(summary.answer.as_deref(), Some("Table A, Table B"));
    assert_eq!(summary.interactions_count, 1);
}

#[tokio::test]
async fn test_continue_thread_waits_for_new_interaction() {
    let remote = ScriptedRemote::completing_after(3);

    let completed = remote
        .continue_thread("thread-1", "And their sizes?", None, &fast_poll())
        .await
        .unwrap();

    // the first two polls only show the earlier, already finished turn
    assert_eq!(remote.calls(), 3);
    assert_eq!(completed.thread_id, "thread-1");
    assert_eq!(completed.interaction_id.as_deref(), Some("int-2"));

    let summary = ThreadSummary::from_state(completed.state());
    assert_eq!(summary.answer.as_deref(), Some("A: 10 rows, B: 20 rows"));
    assert_eq!(summary.interactions_count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_poll_budget_exhausted_is_timeout() {
    let remote = ScriptedRemote::completing_after(usize::MAX);
    let poll = PollConfig::new()
        .with_timeout(Duration::from_secs(120))
        .with_interval(Duration::from_secs(2));

    let err = remote
        .start_thread("slow question", None, &poll)
        .await
        .unwrap_err();

    match err {
        PromptQlError::Timeout { thread_id, waited } => {
            assert_eq!(thread_id, "thread-1");
            assert_eq!(waited, Duration::from_secs(120));
        }
        other => panic!("Expected Timeout, got {:?}", other),
    }
    assert_eq!(remote.calls(), 61);
}

#[tokio::test]
async fn test_status_error_is_returned_immediately() {
    let remote = ScriptedRemote::failing();

    let err = remote
        .start_thread("hi", None, &fast_poll())
        .await
        .unwrap_err();

    assert!(matches!(err, PromptQlError::Connection(_)));
    assert_eq!(remote.calls(), 1);
}
