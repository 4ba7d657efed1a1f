use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::extract::extract_metrics;
use crate::models::{AgentIdentity, AgentMetrics, ConversationRecord};

/// Bot, system and non-agent accounts that never appear on the leaderboard.
pub const DEFAULT_EXCLUDED_AGENT_IDS: [&str; 8] = [
    "8771159", "8915493", "8831788", "8833526", "8833695", "8833161", "8832131", "8835496",
];

/// Ratings at or above this count as a positive CX response.
const POSITIVE_RATING: f64 = 4.0;

pub fn default_excluded_agent_ids() -> HashSet<String> {
    DEFAULT_EXCLUDED_AGENT_IDS
        .iter()
        .map(|id| id.to_string())
        .collect()
}

#[derive(Debug, Default)]
struct AgentAccumulator {
    latencies: Vec<f64>,
    handling_times: Vec<f64>,
    rated: usize,
    positive: usize,
    conversation_count: usize,
}

/// Groups conversations by the teammate who replied first.
///
/// The current assignee is deliberately ignored: it reflects reassignment
/// after the fact. Handling time only counts for single-teammate
/// conversations because a shared conversation reports its total time.
/// Output is ordered by agent id.
pub fn aggregate_metrics(
    conversations: &[ConversationRecord],
    identities: &HashMap<String, AgentIdentity>,
    excluded: &HashSet<String>,
) -> Vec<AgentMetrics> {
    let mut agents: BTreeMap<String, AgentAccumulator> = BTreeMap::new();
    let mut skipped = 0usize;

    for conversation in conversations {
        let Some(agent_id) = conversation.first_teammate() else {
            skipped += 1;
            continue;
        };
        if excluded.contains(agent_id) {
            skipped += 1;
            continue;
        }

        let entry = agents.entry(agent_id.to_string()).or_default();
        entry.conversation_count += 1;

        let metrics = extract_metrics(conversation);

        if let Some(latency) = metrics.response_latency_seconds {
            entry.latencies.push(latency);
        }

        if let Some(handling) = metrics.handling_time_seconds {
            if conversation.teammate_count() == 1 {
                entry.handling_times.push(handling);
            }
        }

        if let Some(rating) = metrics.satisfaction_rating {
            entry.rated += 1;
            if rating >= POSITIVE_RATING {
                entry.positive += 1;
            }
        }
    }

    debug!(
        agents = agents.len(),
        skipped, "aggregated conversations by first teammate"
    );

    agents
        .into_iter()
        .map(|(agent_id, acc)| {
            let identity = identities.get(&agent_id);
            AgentMetrics {
                display_name: identity
                    .map(|identity| identity.name.clone())
                    .unwrap_or_else(|| format!("Agent {agent_id}")),
                email: identity.and_then(|identity| identity.email.clone()),
                conversation_count: acc.conversation_count,
                p95_response_time_seconds: p95(&acc.latencies),
                avg_handling_time_seconds: mean(&acc.handling_times),
                cx_score_percent: if acc.rated == 0 {
                    0.0
                } else {
                    acc.positive as f64 / acc.rated as f64 * 100.0
                },
                qa_score: None,
                agent_id,
            }
        })
        .collect()
}

/// Nearest-rank 95th percentile; 0 for an empty sample.
pub fn p95(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let index = ((0.95 * sorted.len() as f64).ceil() as usize).saturating_sub(1);
    sorted[index]
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
