// HTTP implementation of the PromptQL threads API

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use serde_json::Value;

use crate::config::{mask_secret, ClientConfig};
use crate::error::{PromptQlError, Result};
use crate::snapshot::ThreadPayload;
use crate::traits::ThreadApi;
use crate::types::{Artifact, CancelResult, ThreadHandle, ThreadStatusReport};

const EVENT_STREAM: &str = "text/event-stream";
const JSON: &str = "application/json";

/// PromptQL client (HTTP direct, no SDK)
#[derive(Debug)]
pub struct PromptQlClient {
    http_client: reqwest::Client,
    config: ClientConfig,
}

impl PromptQlClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|_| PromptQlError::Config("Invalid API key format".to_string()))?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PromptQlError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.normalized_base_url(), path)
    }

    /// Body shared by start and continue
    fn build_message_request(&self, message: &str, system_instructions: Option<&str>) -> Value {
        let mut ddn_headers = serde_json::Map::new();
        ddn_headers.insert(
            self.config.auth_mode.header_name().to_string(),
            Value::String(self.config.auth_token.clone()),
        );

        let mut request = serde_json::json!({
            "user_message": { "text": message },
            "ddn_headers": ddn_headers,
            "timezone": self.config.timezone,
        });

        if let (Some(instructions), Some(obj)) = (system_instructions, request.as_object_mut()) {
            obj.insert(
                "system_instructions".to_string(),
                Value::String(instructions.to_string()),
            );
        }

        request
    }

    /// Loggable copy of a request body with the DDN credential masked
    fn redacted(&self, request: &Value) -> String {
        let mut copy = request.clone();
        if let Some(headers) = copy.get_mut("ddn_headers").and_then(Value::as_object_mut) {
            for value in headers.values_mut() {
                if let Some(secret) = value.as_str() {
                    *value = Value::String(mask_secret(secret));
                }
            }
        }
        serde_json::to_string_pretty(&copy).unwrap_or_default()
    }

    fn log_credentials(&self) {
        tracing::debug!(
            api_key = %mask_secret(&self.config.api_key),
            auth_token = %mask_secret(&self.config.auth_token),
            auth_mode = %self.config.auth_mode,
            base_url = %self.config.base_url,
            "Using PromptQL credentials"
        );
    }

    async fn post_message(&self, url: String, request: Value) -> Result<ThreadHandle> {
        self.log_credentials();
        tracing::info!("Request payload:\n{}", self.redacted(&request));

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Connection error posting to {}: {}", url, e);
                PromptQlError::from(e)
            })?;

        let response = ensure_success(response).await?;
        let body = read_body(response).await?;
        parse_thread_handle(&body)
    }
}

/// Turn a non-2xx response into `Api`, keeping the body for diagnostics
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::error!("PromptQL API error ({}): {}", status, body);
    Err(PromptQlError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Body of an accepted response; failing to read it is a protocol fault
async fn read_body(response: Response) -> Result<String> {
    response
        .text()
        .await
        .map_err(|e| PromptQlError::Protocol(format!("Failed to read response body: {}", e)))
}

fn parse_thread_handle(body: &str) -> Result<ThreadHandle> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| PromptQlError::Protocol(format!("Failed to parse response: {}", e)))?;

    let thread_id = value
        .get("thread_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| PromptQlError::Protocol("No thread_id in response".to_string()))?;

    Ok(ThreadHandle {
        thread_id: thread_id.to_string(),
        interaction_id: value
            .get("interaction_id")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

#[async_trait]
impl ThreadApi for PromptQlClient {
    async fn start_thread_without_polling(
        &self,
        message: &str,
        system_instructions: Option<&str>,
    ) -> Result<ThreadHandle> {
        tracing::info!("Starting PromptQL thread: '{}'", message);

        let request = self.build_message_request(message, system_instructions);
        let handle = self.post_message(self.url("start"), request).await?;

        tracing::info!(
            thread_id = %handle.thread_id,
            interaction_id = ?handle.interaction_id,
            "Thread started"
        );
        Ok(handle)
    }

    async fn continue_thread_without_polling(
        &self,
        thread_id: &str,
        message: &str,
        system_instructions: Option<&str>,
    ) -> Result<ThreadHandle> {
        tracing::info!(thread_id, "Continuing PromptQL thread: '{}'", message);

        let request = self.build_message_request(message, system_instructions);
        let handle = self
            .post_message(self.url(&format!("{}/continue", thread_id)), request)
            .await?;

        if handle.thread_id != thread_id {
            tracing::warn!(
                expected = thread_id,
                returned = %handle.thread_id,
                "Continue returned a different thread id"
            );
        }

        Ok(ThreadHandle {
            thread_id: thread_id.to_string(),
            interaction_id: handle.interaction_id,
        })
    }

    async fn get_thread_status(&self, thread_id: &str) -> Result<ThreadStatusReport> {
        let accept = if self.config.stream_status { EVENT_STREAM } else { JSON };
        tracing::debug!(thread_id, accept, "Fetching thread status");

        let response = self
            .http_client
            .get(self.url(thread_id))
            .header(ACCEPT, accept)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(PromptQlError::NotFound(format!("Thread {}", thread_id)));
        }
        let response = ensure_success(response).await?;

        let mut snapshot = ThreadPayload::from_response(response)
            .await?
            .into_snapshot()
            .await?;
        if snapshot.thread_id.is_none() {
            snapshot.thread_id = Some(thread_id.to_string());
        }

        let report = ThreadStatusReport::from_snapshot(thread_id, snapshot);
        tracing::debug!(
            thread_id,
            status = %report.status,
            interactions = report.state().interactions.len(),
            "Thread status"
        );
        Ok(report)
    }

    async fn cancel_thread(&self, thread_id: &str) -> Result<CancelResult> {
        tracing::info!(thread_id, "Cancelling thread");

        let response = self
            .http_client
            .post(self.url(&format!("{}/cancel", thread_id)))
            .send()
            .await?;

        match response.status() {
            StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(thread_id, "Cancel rejected, thread is not processing: {}", body);
                Err(PromptQlError::CancelRejected {
                    thread_id: thread_id.to_string(),
                    body,
                })
            }
            StatusCode::NOT_FOUND => Err(PromptQlError::NotFound(format!("Thread {}", thread_id))),
            _ => {
                let response = ensure_success(response).await?;
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<Value>(&body)
                    .ok()
                    .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_else(|| "Thread cancelled".to_string());

                tracing::info!(thread_id, "Thread cancelled");
                Ok(CancelResult {
                    thread_id: thread_id.to_string(),
                    message,
                })
            }
        }
    }

    async fn get_artifact(&self, thread_id: &str, artifact_id: &str) -> Result<Artifact> {
        tracing::info!(thread_id, artifact_id, "Fetching artifact");

        let response = self
            .http_client
            .get(self.url(&format!("{}/artifacts/{}/data", thread_id, artifact_id)))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(PromptQlError::NotFound(format!(
                "Artifact {} in thread {}",
                artifact_id, thread_id
            )));
        }
        let response = ensure_success(response).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = read_body(response).await?;

        let artifact = Artifact::from_body(thread_id, artifact_id, content_type, &body);
        tracing::info!(
            artifact_id,
            size = artifact.size,
            json = artifact.is_json(),
            "Artifact fetched"
        );
        Ok(artifact)
    }
}
