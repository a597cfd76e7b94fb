pub mod artifact;
pub mod thread;

pub use artifact::Artifact;
pub use thread::{
    ActionCode, ActionStatus, AssistantAction, CancelResult, CodeBlock, CompletedThread,
    Interaction, ThreadHandle, ThreadSnapshot, ThreadState, ThreadStatus, ThreadStatusReport,
    UserMessage,
};
