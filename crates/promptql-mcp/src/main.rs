use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use promptql_client::{mask_secret, AuthMode};
use promptql_mcp::{run_stdio_server, ConfigStore, PromptQlTools};

#[derive(Parser, Debug)]
#[command(name = "promptql-mcp", version, about = "MCP server for PromptQL natural-language data queries")]
struct Cli {
    /// Configuration file (defaults to ~/.promptql-mcp/config.json)
    #[arg(long, global = true, env = "PROMPTQL_MCP_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format; logs always go to stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Save credentials to the configuration file
    Setup {
        #[arg(long)]
        api_key: String,
        #[arg(long)]
        playground_url: String,
        #[arg(long)]
        auth_token: String,
        /// `public` or `private`
        #[arg(long, default_value = "public")]
        auth_mode: String,
    },
    /// Serve tools over stdio (default)
    Run,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.log_format);

    let store = match cli.config {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::default_location().context("Failed to locate the configuration file")?,
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Setup {
            api_key,
            playground_url,
            auth_token,
            auth_mode,
        } => {
            let auth_mode: AuthMode = auth_mode.parse()?;
            store.update(|settings| {
                settings.api_key = Some(api_key);
                settings.playground_url = Some(playground_url);
                settings.auth_token = Some(auth_token);
                settings.auth_mode = Some(auth_mode.to_string());
            })
            .with_context(|| format!("Failed to write {}", store.path().display()))?;
            eprintln!("Configuration saved to {}", store.path().display());
            Ok(())
        }
        Command::Run => {
            let settings = store.load().context("Failed to load configuration")?;
            if settings.is_configured() {
                tracing::info!(
                    api_key = %settings.api_key().map(mask_secret).unwrap_or_default(),
                    playground_url = settings.url().unwrap_or_default(),
                    auth_token = %settings.auth_token().map(mask_secret).unwrap_or_default(),
                    "Using stored PromptQL configuration"
                );
            } else {
                tracing::warn!(
                    "PromptQL is not fully configured (missing: {}). Use the setup_config tool or `promptql-mcp setup`.",
                    settings.missing().join(", ")
                );
            }

            run_stdio_server(PromptQlTools::new(store)).await
        }
    }
}

/// Stdout carries the MCP protocol, so every layer writes to stderr
fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_ansi(false),
                )
                .init();
        }
    }
}
