// Tool operations behind the MCP surface
//
// Every operation returns a JSON map carrying an explicit `success` flag.
// Errors of any kind, panics included, are turned into failure maps here and
// never reach the host runtime.

use futures::FutureExt;
use promptql_client::{
    mask_secret, AuthMode, CompletedThread, PollConfig, PromptQlClient, PromptQlError, ThreadApi,
    ThreadSummary,
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{ConfigStore, ConfigStoreError};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetupConfigRequest {
    /// PromptQL API key
    pub api_key: String,
    /// PromptQL playground URL, e.g. https://promptql.<dataplane-name>.private-ddn.hasura.app/playground
    pub playground_url: String,
    /// DDN auth token for accessing your data
    pub auth_token: String,
    /// `public` (default) or `private`
    #[serde(default)]
    pub auth_mode: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AskQuestionRequest {
    /// Natural-language question about your data
    pub question: String,
    /// Optional system instructions for the LLM
    #[serde(default)]
    pub system_instructions: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StartThreadRequest {
    /// The initial message to start the thread with
    pub message: String,
    /// Optional system instructions for the LLM
    #[serde(default)]
    pub system_instructions: Option<String>,
    /// Seconds to wait for completion (default 120)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Seconds between status checks (default 2)
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StartThreadWithoutPollingRequest {
    /// The initial message to start the thread with
    pub message: String,
    /// Optional system instructions for the LLM
    #[serde(default)]
    pub system_instructions: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ContinueThreadRequest {
    /// The ID of the thread to continue
    pub thread_id: String,
    /// The new message to add to the thread
    pub message: String,
    /// Optional system instructions for the LLM
    #[serde(default)]
    pub system_instructions: Option<String>,
    /// Seconds to wait for completion (default 120)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Seconds between status checks (default 2)
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ThreadIdRequest {
    /// The ID of the thread
    pub thread_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetArtifactRequest {
    /// The ID of the thread that produced the artifact
    pub thread_id: String,
    /// The artifact identifier reported by the thread
    pub artifact_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DataAnalysisArgs {
    /// Subject of the analysis, e.g. "quarterly revenue"
    pub topic: String,
}

/// Text of the `data_analysis` prompt
pub fn data_analysis_prompt(topic: &str) -> String {
    tracing::info!(topic, "Prompt: data_analysis");
    format!(
        "Please analyze my data related to {}.\n\
         Include the following in your analysis:\n\
         1. Key trends over time\n\
         2. Important correlations\n\
         3. Unusual patterns or anomalies\n\
         4. Actionable insights\n",
        topic.trim()
    )
}

#[derive(Error, Debug)]
pub enum ToolError {
    #[error(transparent)]
    Client(#[from] PromptQlError),

    #[error(transparent)]
    Config(#[from] ConfigStoreError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ToolError {
    fn kind(&self) -> &'static str {
        match self {
            ToolError::Client(err) => err.kind(),
            ToolError::Config(ConfigStoreError::Incomplete(_)) => "not_configured",
            ToolError::Config(_) => "config_error",
            ToolError::InvalidArgument(_) => "invalid_argument",
        }
    }

    fn details(&self) -> Option<&str> {
        match self {
            ToolError::Client(err) => err.details(),
            _ => None,
        }
    }

    fn is_expected(&self) -> bool {
        !matches!(self, ToolError::Config(ConfigStoreError::Io { .. } | ConfigStoreError::Serde(_)))
    }

    fn into_failure(self) -> Value {
        let mut failure = json!({
            "success": false,
            "error": self.to_string(),
            "error_type": self.kind(),
        });
        if let (Some(details), Some(obj)) = (self.details(), failure.as_object_mut()) {
            obj.insert("details".to_string(), Value::String(details.to_string()));
        }
        failure
    }
}

type ToolResult = std::result::Result<Value, ToolError>;

fn require(name: &str, value: &str) -> std::result::Result<(), ToolError> {
    if value.trim().is_empty() {
        return Err(ToolError::InvalidArgument(format!("{} must not be empty", name)));
    }
    Ok(())
}

/// Shape of a finished start/continue/ask call
fn completed_result(completed: &CompletedThread) -> Value {
    let summary = ThreadSummary::from_state(completed.state());
    json!({
        "success": true,
        "thread_id": completed.thread_id,
        "interaction_id": completed.interaction_id,
        "answer": summary.answer,
        "plans": summary.plans,
        "code": summary.code,
        "code_outputs": summary.code_outputs,
        "artifacts": summary.artifact_ids,
        "interactions_count": summary.interactions_count,
    })
}

/// PromptQL operations exposed as MCP tools
#[derive(Clone)]
pub struct PromptQlTools {
    store: Arc<ConfigStore>,
    client: Option<Arc<dyn ThreadApi>>,
    poll: PollConfig,
}

impl PromptQlTools {
    /// Tools that build a fresh client from the store on every call
    pub fn new(store: ConfigStore) -> Self {
        Self {
            store: Arc::new(store),
            client: None,
            poll: PollConfig::default(),
        }
    }

    /// Use a fixed API implementation instead of the configured HTTP client
    pub fn with_client(mut self, client: Arc<dyn ThreadApi>) -> Self {
        self.client = Some(client);
        self
    }

    /// Default poll budget for calls that do not override it
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    fn client(&self) -> std::result::Result<Arc<dyn ThreadApi>, ToolError> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }

        let settings = self.store.load()?;
        tracing::info!(
            api_key = settings.api_key().is_some(),
            playground_url = settings.url().is_some(),
            auth_token = settings.auth_token().is_some(),
            "Loaded PromptQL configuration"
        );
        let client = PromptQlClient::new(settings.client_config()?)?;
        Ok(Arc::new(client))
    }

    fn poll_config(
        &self,
        timeout_secs: Option<u64>,
        interval_secs: Option<u64>,
    ) -> std::result::Result<PollConfig, ToolError> {
        let mut poll = self.poll;
        if let Some(secs) = timeout_secs {
            poll = poll.with_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = interval_secs {
            if secs == 0 {
                return Err(ToolError::InvalidArgument(
                    "poll_interval_secs must be at least 1".to_string(),
                ));
            }
            poll = poll.with_interval(Duration::from_secs(secs));
        }
        Ok(poll)
    }

    /// Run one tool body, converting every failure into a failure map
    async fn run<F>(&self, tool: &'static str, body: F) -> Value
    where
        F: Future<Output = ToolResult>,
    {
        tracing::info!(tool, "Tool call");

        match AssertUnwindSafe(body).catch_unwind().await {
            Ok(Ok(value)) => {
                tracing::info!(tool, "Tool call succeeded");
                value
            }
            Ok(Err(err)) => {
                if err.is_expected() {
                    tracing::error!(tool, error_type = err.kind(), "Tool call failed: {}", err);
                } else {
                    tracing::error!(tool, "Unexpected error: {:?}", err);
                }
                err.into_failure()
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(tool, "Unexpected error: tool panicked: {}", reason);
                json!({
                    "success": false,
                    "error": format!("Unexpected error: {}", reason),
                    "error_type": "unexpected",
                })
            }
        }
    }

    pub async fn setup_config(&self, req: SetupConfigRequest) -> Value {
        self.run("setup_config", async {
            require("api_key", &req.api_key)?;
            require("playground_url", &req.playground_url)?;
            require("auth_token", &req.auth_token)?;
            let auth_mode = match req.auth_mode.as_deref() {
                Some(mode) if !mode.trim().is_empty() => mode.parse::<AuthMode>()?,
                _ => AuthMode::default(),
            };

            tracing::info!(
                api_key = %mask_secret(&req.api_key),
                playground_url = %req.playground_url,
                auth_token = %mask_secret(&req.auth_token),
                auth_mode = %auth_mode,
                "Saving configuration"
            );

            self.store.update(|settings| {
                settings.api_key = Some(req.api_key.clone());
                settings.playground_url = Some(req.playground_url.clone());
                settings.auth_token = Some(req.auth_token.clone());
                settings.auth_mode = Some(auth_mode.to_string());
            })?;

            Ok(json!({
                "success": true,
                "message": "Configuration saved successfully.",
            }))
        })
        .await
    }

    pub async fn check_config(&self) -> Value {
        self.run("check_config", async {
            let settings = self.store.load()?;
            let missing = settings.missing();
            let configured = missing.is_empty();

            let message = if configured {
                "PromptQL is configured.".to_string()
            } else {
                format!("PromptQL is not fully configured. Missing: {}", missing.join(", "))
            };

            Ok(json!({
                "success": true,
                "configured": configured,
                "message": message,
                "api_key": settings.api_key().map(mask_secret),
                "playground_url": settings.url(),
                "auth_token": settings.auth_token().map(mask_secret),
                "auth_mode": settings.auth_mode()?.as_str(),
                "missing": missing,
            }))
        })
        .await
    }

    pub async fn ask_question(&self, req: AskQuestionRequest) -> Value {
        self.run("ask_question", async {
            require("question", &req.question)?;
            let completed = self
                .client()?
                .start_thread(&req.question, req.system_instructions.as_deref(), &self.poll)
                .await?;
            Ok(completed_result(&completed))
        })
        .await
    }

    pub async fn start_thread(&self, req: StartThreadRequest) -> Value {
        self.run("start_thread", async {
            require("message", &req.message)?;
            let poll = self.poll_config(req.timeout_secs, req.poll_interval_secs)?;
            let completed = self
                .client()?
                .start_thread(&req.message, req.system_instructions.as_deref(), &poll)
                .await?;
            Ok(completed_result(&completed))
        })
        .await
    }

    pub async fn start_thread_without_polling(&self, req: StartThreadWithoutPollingRequest) -> Value {
        self.run("start_thread_without_polling", async {
            require("message", &req.message)?;
            let handle = self
                .client()?
                .start_thread_without_polling(&req.message, req.system_instructions.as_deref())
                .await?;

            Ok(json!({
                "success": true,
                "thread_id": handle.thread_id,
                "interaction_id": handle.interaction_id,
                "message": "Thread started successfully. Use get_thread_status to check progress or continue_thread to add more messages.",
            }))
        })
        .await
    }

    pub async fn continue_thread(&self, req: ContinueThreadRequest) -> Value {
        self.run("continue_thread", async {
            require("thread_id", &req.thread_id)?;
            require("message", &req.message)?;
            let poll = self.poll_config(req.timeout_secs, req.poll_interval_secs)?;
            let completed = self
                .client()?
                .continue_thread(&req.thread_id, &req.message, req.system_instructions.as_deref(), &poll)
                .await?;
            Ok(completed_result(&completed))
        })
        .await
    }

    pub async fn get_thread_status(&self, req: ThreadIdRequest) -> Value {
        self.run("get_thread_status", async {
            require("thread_id", &req.thread_id)?;
            let report = self.client()?.get_thread_status(&req.thread_id).await?;
            let summary = ThreadSummary::from_state(report.state());

            let message = if report.is_complete() {
                "The thread has completed processing."
            } else {
                "The thread is currently processing. Check again in a few moments."
            };

            Ok(json!({
                "success": true,
                "thread_id": report.thread_id,
                "status": report.status,
                "title": report.snapshot.title,
                "interactions_count": summary.interactions_count,
                "answer": summary.answer,
                "artifacts": summary.artifact_ids,
                "message": message,
            }))
        })
        .await
    }

    pub async fn cancel_thread(&self, req: ThreadIdRequest) -> Value {
        self.run("cancel_thread", async {
            require("thread_id", &req.thread_id)?;
            let result = self.client()?.cancel_thread(&req.thread_id).await?;

            Ok(json!({
                "success": true,
                "thread_id": result.thread_id,
                "message": result.message,
            }))
        })
        .await
    }

    pub async fn get_artifact(&self, req: GetArtifactRequest) -> Value {
        self.run("get_artifact", async {
            require("thread_id", &req.thread_id)?;
            require("artifact_id", &req.artifact_id)?;
            let artifact = self
                .client()?
                .get_artifact(&req.thread_id, &req.artifact_id)
                .await?;

            Ok(json!({
                "success": true,
                "thread_id": artifact.thread_id,
                "artifact_id": artifact.artifact_id,
                "content_type": artifact.content_type,
                "size": artifact.size,
                "data": artifact.data,
            }))
        })
        .await
    }
}
