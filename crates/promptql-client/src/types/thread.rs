use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle of a single assistant action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Processing,
    Complete,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Thread status as derived from the latest interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    Processing,
    Complete,
}

impl ThreadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadStatus::Processing => "processing",
            ThreadStatus::Complete => "complete",
        }
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub uploads: Vec<Value>,
}

/// Executed code attached to an action
///
/// Older servers send the code as a bare string, newer ones as an object
/// carrying the query plan, execution timestamps and results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionCode {
    Text(String),
    Block(CodeBlock),
}

impl ActionCode {
    pub fn text(&self) -> &str {
        match self {
            ActionCode::Text(code) => code,
            ActionCode::Block(block) => &block.code,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_plan: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_start_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_end_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub sql_statements: Vec<Value>,
}

/// One computation step of the assistant's response to an interaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantAction {
    #[serde(default, deserialize_with = "null_as_default")]
    pub action_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ActionCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_output: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub artifact_identifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_call_start_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_call_end_timestamp: Option<String>,
}

impl AssistantAction {
    /// Whether this action alone marks its interaction as finished
    pub fn is_terminal(&self) -> bool {
        self.status == ActionStatus::Complete
            || self.message.is_some()
            || self.llm_call_end_timestamp.is_some()
    }

    /// Code output rendered as text; structured outputs are serialized
    pub fn code_output_text(&self) -> Option<String> {
        match self.code_output.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// One user turn and the actions taken in response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    #[serde(default, deserialize_with = "null_as_default")]
    pub interaction_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_message: UserMessage,
    #[serde(default, deserialize_with = "null_as_default")]
    pub assistant_actions: Vec<AssistantAction>,
}

/// Canonical thread state, independent of the wire encoding it arrived in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadState {
    #[serde(default, deserialize_with = "null_as_default")]
    pub interactions: Vec<Interaction>,
}

impl ThreadState {
    pub fn latest_interaction(&self) -> Option<&Interaction> {
        self.interactions.last()
    }

    /// Complete iff the latest interaction has a terminal action
    pub fn is_complete(&self) -> bool {
        self.latest_interaction()
            .map(|interaction| interaction.assistant_actions.iter().any(AssistantAction::is_terminal))
            .unwrap_or(false)
    }

    pub fn status(&self) -> ThreadStatus {
        if self.is_complete() {
            ThreadStatus::Complete
        } else {
            ThreadStatus::Processing
        }
    }
}

/// A fetched point-in-time view of a thread
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    #[serde(alias = "state")]
    pub thread_state: ThreadState,
}

/// Result of `get_thread_status`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadStatusReport {
    pub thread_id: String,
    pub status: ThreadStatus,
    pub snapshot: ThreadSnapshot,
}

impl ThreadStatusReport {
    pub fn from_snapshot(thread_id: impl Into<String>, snapshot: ThreadSnapshot) -> Self {
        Self {
            thread_id: thread_id.into(),
            status: snapshot.thread_state.status(),
            snapshot,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == ThreadStatus::Complete
    }

    pub fn state(&self) -> &ThreadState {
        &self.snapshot.thread_state
    }
}

/// Identifiers returned by start and continue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadHandle {
    pub thread_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_id: Option<String>,
}

/// A thread that finished its latest interaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedThread {
    pub thread_id: String,
    pub interaction_id: Option<String>,
    pub snapshot: ThreadSnapshot,
}

impl CompletedThread {
    pub fn state(&self) -> &ThreadState {
        &self.snapshot.thread_state
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelResult {
    pub thread_id: String,
    pub message: String,
}

/// Explicit `null` reads as the field's default, like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
