use config::{Config as ConfigLoader, Environment, File, FileFormat};
use promptql_client::{AuthMode, ClientConfig, PromptQlError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_PREFIX: &str = "PROMPTQL";
const CONFIG_DIR: &str = ".promptql-mcp";
const CONFIG_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigStoreError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration file: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Could not determine the home directory")]
    NoHomeDir,

    #[error("PromptQL is not fully configured. Missing: {}", .0.join(", "))]
    Incomplete(Vec<&'static str>),

    #[error(transparent)]
    Invalid(#[from] PromptQlError),
}

pub type Result<T> = std::result::Result<T, ConfigStoreError>;

/// Persisted settings; every key is optional until `client_config` is asked for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playground_url: Option<String>,
    /// Older name for `playground_url`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ddn_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl Settings {
    pub fn url(&self) -> Option<&str> {
        non_empty(&self.playground_url).or_else(|| non_empty(&self.ddn_url))
    }

    pub fn api_key(&self) -> Option<&str> {
        non_empty(&self.api_key)
    }

    pub fn auth_token(&self) -> Option<&str> {
        non_empty(&self.auth_token)
    }

    pub fn auth_mode(&self) -> std::result::Result<AuthMode, PromptQlError> {
        match non_empty(&self.auth_mode) {
            Some(mode) => mode.parse(),
            None => Ok(AuthMode::default()),
        }
    }

    /// Human-readable names of the required keys that are absent
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_key().is_none() {
            missing.push("API Key");
        }
        if self.url().is_none() {
            missing.push("Playground URL");
        }
        if self.auth_token().is_none() {
            missing.push("Auth Token");
        }
        missing
    }

    pub fn is_configured(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn client_config(&self) -> Result<ClientConfig> {
        let (Some(api_key), Some(url), Some(auth_token)) = (self.api_key(), self.url(), self.auth_token())
        else {
            return Err(ConfigStoreError::Incomplete(self.missing()));
        };

        let mut config = ClientConfig::new(api_key, url, auth_token).with_auth_mode(self.auth_mode()?);
        if let Some(timezone) = non_empty(&self.timezone) {
            config = config.with_timezone(timezone);
        }
        Ok(config)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// File-backed settings with environment overrides
///
/// Reads layer `PROMPTQL_*` variables over the JSON file; writes only touch the
/// file. Concurrent writers are not coordinated, the last one wins.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    env_prefix: String,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// `~/.promptql-mcp/config.json`
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir().ok_or(ConfigStoreError::NoHomeDir)?;
        Ok(Self::new(home.join(CONFIG_DIR).join(CONFIG_FILE)))
    }

    /// Read overrides from `{prefix}_*` instead of `PROMPTQL_*`
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Effective settings: file first, then environment
    pub fn load(&self) -> Result<Settings> {
        let loader = ConfigLoader::builder()
            .add_source(
                File::from(self.path.as_path())
                    .format(FileFormat::Json)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .try_parsing(false)
                    .ignore_empty(true),
            )
            .build()?;

        Ok(loader.try_deserialize()?)
    }

    /// Settings as stored on disk, ignoring the environment
    pub fn load_file(&self) -> Result<Settings> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(Settings::default()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(source) => Err(ConfigStoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Apply `change` to the on-disk settings and write them back
    pub fn update(&self, change: impl FnOnce(&mut Settings)) -> Result<Settings> {
        let mut settings = self.load_file()?;
        change(&mut settings);
        self.save(&settings)?;
        Ok(settings)
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        let io_err = |source| ConfigStoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let contents = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, contents).map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600)).map_err(io_err)?;
        }

        tracing::info!("Configuration saved to {}", self.path.display());
        Ok(())
    }
}
