use async_trait::async_trait;

use crate::error::Result;
use crate::poller::{wait_for_completion, wait_for_interaction, PollConfig};
use crate::types::{Artifact, CancelResult, CompletedThread, ThreadHandle, ThreadStatusReport};

/// Thread lifecycle operations against a PromptQL project
///
/// Implementors provide the five wire calls; the polling variants of
/// start and continue are derived from them.
#[async_trait]
pub trait ThreadApi: Send + Sync {
    /// Create a thread and return as soon as the server accepts it
    async fn start_thread_without_polling(
        &self,
        message: &str,
        system_instructions: Option<&str>,
    ) -> Result<ThreadHandle>;

    /// Append a user turn to an existing thread without waiting
    async fn continue_thread_without_polling(
        &self,
        thread_id: &str,
        message: &str,
        system_instructions: Option<&str>,
    ) -> Result<ThreadHandle>;

    async fn get_thread_status(&self, thread_id: &str) -> Result<ThreadStatusReport>;

    /// Cancel the in-flight interaction; rejected when nothing is processing
    async fn cancel_thread(&self, thread_id: &str) -> Result<CancelResult>;

    async fn get_artifact(&self, thread_id: &str, artifact_id: &str) -> Result<Artifact>;

    /// Start a thread and wait for its first interaction to finish
    async fn start_thread(
        &self,
        message: &str,
        system_instructions: Option<&str>,
        poll: &PollConfig,
    ) -> Result<CompletedThread> {
        let handle = self
            .start_thread_without_polling(message, system_instructions)
            .await?;
        let report = wait_for_completion(self, &handle.thread_id, poll).await?;

        Ok(CompletedThread {
            thread_id: handle.thread_id,
            interaction_id: handle.interaction_id,
            snapshot: report.snapshot,
        })
    }

    /// Continue a thread and wait for the new interaction to finish
    ///
    /// When the server reports the new interaction's id, earlier completed
    /// interactions are not mistaken for it.
    async fn continue_thread(
        &self,
        thread_id: &str,
        message: &str,
        system_instructions: Option<&str>,
        poll: &PollConfig,
    ) -> Result<CompletedThread> {
        let handle = self
            .continue_thread_without_polling(thread_id, message, system_instructions)
            .await?;
        let report = wait_for_interaction(
            self,
            thread_id,
            handle.interaction_id.as_deref(),
            poll,
        )
        .await?;

        Ok(CompletedThread {
            thread_id: thread_id.to_string(),
            interaction_id: handle.interaction_id,
            snapshot: report.snapshot,
        })
    }
}
