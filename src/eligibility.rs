use crate::models::AgentMetrics;

pub const DEFAULT_MIN_CONVERSATIONS: usize = 100;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EligibilityPartition {
    pub eligible: Vec<AgentMetrics>,
    pub ineligible: Vec<AgentMetrics>,
}

/// Splits agents on conversation volume. Input order is kept in both halves.
pub fn filter_eligible(agents: Vec<AgentMetrics>, min_conversations: usize) -> EligibilityPartition {
    let (eligible, ineligible) = agents
        .into_iter()
        .partition(|agent| agent.conversation_count >= min_conversations);

    EligibilityPartition {
        eligible,
        ineligible,
    }
}
