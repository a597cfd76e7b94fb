//! MCP server exposing PromptQL threads as tools.

use rmcp::{
    handler::server::{router::prompt::PromptRouter, tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, GetPromptRequestParam, GetPromptResult, ListPromptsResult,
        PaginatedRequestParam, PromptMessage, PromptMessageRole, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    prompt, prompt_handler, prompt_router, tool, tool_handler, tool_router,
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
};
use serde_json::Value;

use crate::tools::{
    data_analysis_prompt, AskQuestionRequest, ContinueThreadRequest, DataAnalysisArgs,
    GetArtifactRequest, PromptQlTools, SetupConfigRequest, StartThreadRequest,
    StartThreadWithoutPollingRequest, ThreadIdRequest,
};

const INSTRUCTIONS: &str = r#"PromptQL answers natural-language questions about data connected through Hasura DDN.

Call setup_config once with the API key, playground URL and DDN auth token, then check_config to verify.

For a single question use ask_question. For multi-turn analysis use start_thread, then continue_thread with the returned thread_id.
Long-running questions can be started with start_thread_without_polling and followed with get_thread_status; cancel_thread stops a processing thread.
Artifacts listed in a result can be fetched with get_artifact.
The data_analysis prompt drafts an analysis request for a topic.

Every tool returns a JSON object with a `success` flag; failures carry `error` and `error_type`."#;

/// Wrap a tool's structured result; `success: false` becomes an error result
fn into_call_result(value: Value) -> Result<CallToolResult, McpError> {
    let failed = value.get("success").and_then(Value::as_bool) == Some(false);
    let text = serde_json::to_string_pretty(&value)
        .map_err(|e| McpError::internal_error(format!("Failed to serialize result: {}", e), None))?;

    if failed {
        Ok(CallToolResult::error(vec![Content::text(text)]))
    } else {
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

#[derive(Clone)]
pub struct PromptQlServer {
    tools: PromptQlTools,
    tool_router: ToolRouter<Self>,
    prompt_router: PromptRouter<Self>,
}

impl PromptQlServer {
    pub fn new(tools: PromptQlTools) -> Self {
        Self {
            tools,
            tool_router: Self::tool_router(),
            prompt_router: Self::prompt_router(),
        }
    }

    pub fn tools(&self) -> &PromptQlTools {
        &self.tools
    }
}

#[tool_router]
impl PromptQlServer {
    #[tool(
        description = "Configure the PromptQL MCP server with API key, playground URL and DDN auth token. auth_mode is 'public' (Auth-Token header) or 'private' (x-hasura-ddn-token header)."
    )]
    async fn setup_config(
        &self,
        Parameters(req): Parameters<SetupConfigRequest>,
    ) -> Result<CallToolResult, McpError> {
        into_call_result(self.tools.setup_config(req).await)
    }

    #[tool(description = "Check the current PromptQL configuration. Secrets are masked.")]
    async fn check_config(&self) -> Result<CallToolResult, McpError> {
        into_call_result(self.tools.check_config().await)
    }

    #[tool(
        description = "Ask a natural-language question about your data and wait for the answer. Returns the answer, plans, code, code outputs and artifact identifiers."
    )]
    async fn ask_question(
        &self,
        Parameters(req): Parameters<AskQuestionRequest>,
    ) -> Result<CallToolResult, McpError> {
        into_call_result(self.tools.ask_question(req).await)
    }

    #[tool(
        description = "Start a new conversation thread with an initial message and wait for it to complete. Use the returned thread_id with continue_thread."
    )]
    async fn start_thread(
        &self,
        Parameters(req): Parameters<StartThreadRequest>,
    ) -> Result<CallToolResult, McpError> {
        into_call_result(self.tools.start_thread(req).await)
    }

    #[tool(
        description = "Start a new conversation thread and return its thread_id immediately without waiting. Use get_thread_status to follow progress."
    )]
    async fn start_thread_without_polling(
        &self,
        Parameters(req): Parameters<StartThreadWithoutPollingRequest>,
    ) -> Result<CallToolResult, McpError> {
        into_call_result(self.tools.start_thread_without_polling(req).await)
    }

    #[tool(description = "Continue an existing thread with a new message and wait for it to complete.")]
    async fn continue_thread(
        &self,
        Parameters(req): Parameters<ContinueThreadRequest>,
    ) -> Result<CallToolResult, McpError> {
        into_call_result(self.tools.continue_thread(req).await)
    }

    #[tool(description = "Get the current status of a thread: processing or complete, plus the latest answer if any.")]
    async fn get_thread_status(
        &self,
        Parameters(req): Parameters<ThreadIdRequest>,
    ) -> Result<CallToolResult, McpError> {
        into_call_result(self.tools.get_thread_status(req).await)
    }

    #[tool(description = "Cancel the processing interaction of a thread. Fails if the thread is not processing.")]
    async fn cancel_thread(
        &self,
        Parameters(req): Parameters<ThreadIdRequest>,
    ) -> Result<CallToolResult, McpError> {
        into_call_result(self.tools.cancel_thread(req).await)
    }

    #[tool(description = "Fetch the data of an artifact produced by a thread. JSON artifacts are returned parsed.")]
    async fn get_artifact(
        &self,
        Parameters(req): Parameters<GetArtifactRequest>,
    ) -> Result<CallToolResult, McpError> {
        into_call_result(self.tools.get_artifact(req).await)
    }
}

#[prompt_router]
impl PromptQlServer {
    #[prompt(
        name = "data_analysis",
        description = "Create a prompt for data analysis on a specific topic"
    )]
    async fn data_analysis(
        &self,
        Parameters(args): Parameters<DataAnalysisArgs>,
    ) -> Result<GetPromptResult, McpError> {
        if args.topic.trim().is_empty() {
            return Err(McpError::invalid_params("topic must not be empty", None));
        }
        Ok(GetPromptResult {
            description: Some(format!("Data analysis of {}", args.topic)),
            messages: vec![PromptMessage::new_text(
                PromptMessageRole::User,
                data_analysis_prompt(&args.topic),
            )],
        })
    }
}

#[tool_handler]
#[prompt_handler]
impl ServerHandler for PromptQlServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: rmcp::model::Implementation {
                name: "promptql".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: Some("PromptQL MCP".into()),
                icons: None,
                website_url: None,
            },
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .build(),
            instructions: Some(INSTRUCTIONS.into()),
            ..Default::default()
        }
    }
}

/// Serve the tools over stdin/stdout until the client disconnects
pub async fn run_stdio_server(tools: PromptQlTools) -> anyhow::Result<()> {
    use tokio::io::{stdin, stdout};

    tracing::info!("Starting PromptQL MCP server via stdio");

    let server = PromptQlServer::new(tools).serve((stdin(), stdout())).await?;

    let quit_reason = server.waiting().await?;
    tracing::info!("MCP server stopped: {:?}", quit_reason);

    Ok(())
}
