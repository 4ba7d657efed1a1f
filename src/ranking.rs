use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::aggregate::{aggregate_metrics, default_excluded_agent_ids};
use crate::eligibility::{filter_eligible, DEFAULT_MIN_CONVERSATIONS};
use crate::models::{
    AgentIdentity, AgentMetrics, AgentRanking, ConversationRecord, Leaderboard, MetricDirection,
    Tier,
};
use crate::percentile::compute_percentiles;

/// QA scores keyed by agent display name or agent id.
pub type QaScores = HashMap<String, f64>;

const QA_WEIGHT: f64 = 0.25;

#[derive(Debug, Clone, PartialEq)]
pub struct RankingConfig {
    pub min_conversations: usize,
    pub excluded_agent_ids: HashSet<String>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_conversations: DEFAULT_MIN_CONVERSATIONS,
            excluded_agent_ids: default_excluded_agent_ids(),
        }
    }
}

/// Runs one full refresh pass: aggregate, merge QA, filter, score and rank.
pub fn build_leaderboard(
    conversations: &[ConversationRecord],
    identities: &HashMap<String, AgentIdentity>,
    config: &RankingConfig,
    qa_scores: Option<&QaScores>,
) -> Leaderboard {
    let agents = aggregate_metrics(conversations, identities, &config.excluded_agent_ids);
    info!(
        agents = agents.len(),
        conversations = conversations.len(),
        "aggregated agent metrics"
    );

    let rankings = rank_agents(agents, qa_scores, config.min_conversations);
    let eligible_count = rankings.iter().filter(|r| r.is_eligible).count();

    Leaderboard {
        agent_count: rankings.len(),
        eligible_count,
        conversation_count: conversations.len(),
        min_conversations: config.min_conversations,
        rankings,
    }
}

/// Looks each agent up by display name first, then by agent id.
pub fn merge_qa_scores(agents: &mut [AgentMetrics], qa_scores: &QaScores) {
    for agent in agents.iter_mut() {
        let score = qa_scores
            .get(&agent.display_name)
            .or_else(|| qa_scores.get(&agent.agent_id));
        if let Some(score) = score {
            agent.qa_score = Some(*score);
        }
    }
}

pub fn rank_agents(
    mut agents: Vec<AgentMetrics>,
    qa_scores: Option<&QaScores>,
    min_conversations: usize,
) -> Vec<AgentRanking> {
    if let Some(qa_scores) = qa_scores {
        merge_qa_scores(&mut agents, qa_scores);
    }

    let partition = filter_eligible(agents, min_conversations);
    let eligible = partition.eligible;

    let p95_percentiles = compute_percentiles(
        &metric_cohort(&eligible, |a| a.p95_response_time_seconds),
        MetricDirection::LowerIsBetter,
    );
    let aht_percentiles = compute_percentiles(
        &metric_cohort(&eligible, |a| a.avg_handling_time_seconds),
        MetricDirection::LowerIsBetter,
    );
    let cx_percentiles = compute_percentiles(
        &metric_cohort(&eligible, |a| a.cx_score_percent),
        MetricDirection::HigherIsBetter,
    );

    // Only agents with a QA score compete on QA.
    let qa_cohort: Vec<(&str, f64)> = eligible
        .iter()
        .filter_map(|agent| agent.qa_score.map(|score| (agent.agent_id.as_str(), score)))
        .collect();
    let qa_percentiles = compute_percentiles(&qa_cohort, MetricDirection::HigherIsBetter);

    debug!(
        eligible = eligible.len(),
        ineligible = partition.ineligible.len(),
        with_qa = qa_cohort.len(),
        "computed metric percentiles"
    );

    let mut ranked: Vec<AgentRanking> = eligible
        .iter()
        .map(|agent| {
            let lookup = |map: &HashMap<String, f64>| map.get(&agent.agent_id).copied();
            let p95 = lookup(&p95_percentiles).unwrap_or(0.0);
            let aht = lookup(&aht_percentiles).unwrap_or(0.0);
            let cx = lookup(&cx_percentiles).unwrap_or(0.0);
            let qa = lookup(&qa_percentiles);

            AgentRanking {
                metrics: agent.clone(),
                p95_response_percentile: p95,
                aht_percentile: aht,
                cx_score_percentile: cx,
                qa_score_percentile: qa,
                composite_score: composite_score(p95, aht, cx, qa),
                rank: 0,
                is_eligible: true,
                tier: Tier::Rising,
            }
        })
        .collect();

    ranked.sort_by(compare_rankings);

    let total = ranked.len();
    for (index, ranking) in ranked.iter_mut().enumerate() {
        ranking.rank = index + 1;
        ranking.tier = tier_for_rank(ranking.rank, total);
    }

    ranked.extend(partition.ineligible.into_iter().map(placeholder));
    ranked
}

fn metric_cohort<'a>(
    agents: &'a [AgentMetrics],
    value: fn(&AgentMetrics) -> f64,
) -> Vec<(&'a str, f64)> {
    agents
        .iter()
        .map(|agent| (agent.agent_id.as_str(), value(agent)))
        .collect()
}

/// Equal weights; a missing QA percentile spreads its share over the rest
/// instead of counting as zero.
pub fn composite_score(p95: f64, aht: f64, cx: f64, qa: Option<f64>) -> f64 {
    match qa {
        Some(qa) => (p95 + aht + cx + qa) * QA_WEIGHT,
        None => (p95 + aht + cx) / 3.0,
    }
}

/// Best first: composite, then CX percentile, then AHT percentile, then
/// display name ascending. Agent id settles identical names.
pub fn compare_rankings(a: &AgentRanking, b: &AgentRanking) -> Ordering {
    b.composite_score
        .total_cmp(&a.composite_score)
        .then_with(|| b.cx_score_percentile.total_cmp(&a.cx_score_percentile))
        .then_with(|| b.aht_percentile.total_cmp(&a.aht_percentile))
        .then_with(|| a.metrics.display_name.cmp(&b.metrics.display_name))
        .then_with(|| a.metrics.agent_id.cmp(&b.metrics.agent_id))
}

pub fn tier_for_rank(rank: usize, total: usize) -> Tier {
    if total == 0 {
        return Tier::Rising;
    }

    let pct = total.saturating_sub(rank) as f64 / total as f64 * 100.0;
    match pct {
        p if p >= 90.0 => Tier::Diamond,
        p if p >= 75.0 => Tier::Gold,
        p if p >= 50.0 => Tier::Silver,
        p if p >= 25.0 => Tier::Bronze,
        _ => Tier::Rising,
    }
}

fn placeholder(agent: AgentMetrics) -> AgentRanking {
    AgentRanking {
        metrics: agent,
        p95_response_percentile: 0.0,
        aht_percentile: 0.0,
        cx_score_percentile: 0.0,
        qa_score_percentile: None,
        composite_score: 0.0,
        rank: 0,
        is_eligible: false,
        tier: Tier::Rising,
    }
}
