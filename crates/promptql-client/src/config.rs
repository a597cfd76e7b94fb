// Connection settings for a PromptQL client
// Built explicitly by the caller and passed to `PromptQlClient::new`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::PromptQlError;

pub const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// How the DDN credential is presented to the project's data plane
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Public,
    Private,
}

impl AuthMode {
    /// Header name the DDN token is sent under
    pub fn header_name(&self) -> &'static str {
        match self {
            AuthMode::Public => "Auth-Token",
            AuthMode::Private => "x-hasura-ddn-token",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Public => "public",
            AuthMode::Private => "private",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = PromptQlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(AuthMode::Public),
            "private" => Ok(AuthMode::Private),
            other => Err(PromptQlError::Config(format!(
                "unknown auth mode '{}', expected 'public' or 'private'",
                other
            ))),
        }
    }
}

/// Everything needed to talk to one PromptQL project
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub api_key: String,
    /// Threads API base, e.g. the project's playground URL
    pub base_url: String,
    pub auth_token: String,
    #[serde(default)]
    pub auth_mode: AuthMode,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Per-request timeout, independent of any polling budget
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
    /// Ask for `text/event-stream` on status fetches
    #[serde(default = "default_stream_status")]
    pub stream_status: bool,
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_stream_status() -> bool {
    true
}

impl ClientConfig {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            auth_token: auth_token.into(),
            auth_mode: AuthMode::default(),
            timezone: default_timezone(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            stream_status: true,
        }
    }

    pub fn with_auth_mode(mut self, mode: AuthMode) -> Self {
        self.auth_mode = mode;
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_stream_status(mut self, enabled: bool) -> Self {
        self.stream_status = enabled;
        self
    }

    /// Base URL without a trailing slash
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

// Secrets never reach logs unmasked, including through `{:?}`
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .field("auth_token", &mask_secret(&self.auth_token))
            .field("auth_mode", &self.auth_mode)
            .field("timezone", &self.timezone)
            .field("request_timeout", &self.request_timeout)
            .field("stream_status", &self.stream_status)
            .finish()
    }
}

/// Redact the middle of a credential for display
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 12 {
        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        let head: String = chars.iter().take(4).collect();
        format!("{}...", head)
    }
}
