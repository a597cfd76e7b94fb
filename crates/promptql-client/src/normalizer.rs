// Flattens a thread state into the fields callers actually consume

use serde::Serialize;

use crate::types::ThreadState;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThreadSummary {
    /// Last non-empty message of the latest interaction
    pub answer: Option<String>,
    pub plans: Vec<String>,
    pub code: Vec<String>,
    pub code_outputs: Vec<String>,
    /// Artifact identifiers referenced anywhere in the thread
    pub artifact_ids: Vec<String>,
    pub interactions_count: usize,
}

impl ThreadSummary {
    pub fn from_state(state: &ThreadState) -> Self {
        let mut summary = ThreadSummary {
            interactions_count: state.interactions.len(),
            artifact_ids: state
                .interactions
                .iter()
                .flat_map(|interaction| &interaction.assistant_actions)
                .flat_map(|action| action.artifact_identifiers.iter().cloned())
                .collect(),
            ..Default::default()
        };

        let Some(latest) = state.latest_interaction() else {
            return summary;
        };

        summary.answer = latest
            .assistant_actions
            .iter()
            .rev()
            .filter_map(|action| action.message.as_deref())
            .find(|message| !message.trim().is_empty())
            .map(str::to_string);

        for action in &latest.assistant_actions {
            if let Some(plan) = action.plan.as_deref().filter(|p| !p.trim().is_empty()) {
                summary.plans.push(plan.to_string());
            }
            if let Some(code) = action.code.as_ref().map(|c| c.text()).filter(|c| !c.trim().is_empty()) {
                summary.code.push(code.to_string());
            }
            if let Some(output) = action.code_output_text().filter(|o| !o.trim().is_empty()) {
                summary.code_outputs.push(output);
            }
        }

        summary
    }

    pub fn has_artifacts(&self) -> bool {
        !self.artifact_ids.is_empty()
    }
}
