pub mod buffer_utils;
pub mod client;
pub mod config;
pub mod error;
pub mod normalizer;
pub mod poller;
pub mod snapshot;
pub mod traits;
pub mod types;

pub use client::PromptQlClient;
pub use config::{mask_secret, AuthMode, ClientConfig};
pub use error::{PromptQlError, Result};
pub use normalizer::ThreadSummary;
pub use poller::{poll_until, wait_for_completion, wait_for_interaction, PollConfig};
pub use snapshot::{latest_thread_state, snapshot_from_json, ThreadPayload};
pub use traits::ThreadApi;
pub use types::{
    Artifact, AssistantAction, CancelResult, CompletedThread, Interaction, ThreadHandle,
    ThreadSnapshot, ThreadState, ThreadStatus, ThreadStatusReport,
};
