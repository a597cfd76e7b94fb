pub mod config;
pub mod server;
pub mod tools;

pub use config::{ConfigStore, ConfigStoreError, Settings};
pub use server::{run_stdio_server, PromptQlServer};
pub use tools::PromptQlTools;
