use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One support conversation as exported by the ticketing fetcher.
///
/// `teammate_ids` is ordered by first reply, so position 0 is the agent who
/// answered first. Every other field may be absent.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConversationRecord {
    #[serde(default)]
    pub teammate_ids: Vec<String>,
    /// Unix seconds when the conversation reached a human teammate.
    #[serde(default)]
    pub last_assignment_at: Option<i64>,
    /// Unix seconds of the first teammate reply.
    #[serde(default)]
    pub first_admin_reply_at: Option<i64>,
    #[serde(default)]
    pub response_latency_seconds: Option<f64>,
    #[serde(default)]
    pub handling_time_seconds: Option<f64>,
    /// Raw rating attribute; anything but a number in [1, 5] is ignored.
    #[serde(default)]
    pub satisfaction_rating: Option<serde_json::Value>,
}

impl ConversationRecord {
    pub fn first_teammate(&self) -> Option<&str> {
        self.teammate_ids
            .first()
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn teammate_count(&self) -> usize {
        self.teammate_ids.len()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentIdentity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub agent_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub conversation_count: usize,
    pub p95_response_time_seconds: f64,
    pub avg_handling_time_seconds: f64,
    pub cx_score_percent: f64,
    pub qa_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRanking {
    #[serde(flatten)]
    pub metrics: AgentMetrics,
    pub p95_response_percentile: f64,
    pub aht_percentile: f64,
    pub cx_score_percentile: f64,
    pub qa_score_percentile: Option<f64>,
    pub composite_score: f64,
    pub rank: usize,
    pub is_eligible: bool,
    pub tier: Tier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Diamond,
    Gold,
    Silver,
    Bronze,
    Rising,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Diamond,
        Tier::Gold,
        Tier::Silver,
        Tier::Bronze,
        Tier::Rising,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tier::Diamond => "Diamond",
            Tier::Gold => "Gold",
            Tier::Silver => "Silver",
            Tier::Bronze => "Bronze",
            Tier::Rising => "Rising",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Tier::Diamond => "blue",
            Tier::Gold => "yellow",
            Tier::Silver => "gray",
            Tier::Bronze => "orange",
            Tier::Rising => "green",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricDirection {
    LowerIsBetter,
    HigherIsBetter,
}

/// Ordered rankings (eligible first) plus the counts a refresh log needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboard {
    pub rankings: Vec<AgentRanking>,
    pub agent_count: usize,
    pub eligible_count: usize,
    pub conversation_count: usize,
    /// Threshold the rankings were built with, after any override.
    pub min_conversations: usize,
}

impl Leaderboard {
    pub fn eligible(&self) -> impl Iterator<Item = &AgentRanking> {
        self.rankings.iter().filter(|ranking| ranking.is_eligible)
    }

    pub fn ineligible(&self) -> impl Iterator<Item = &AgentRanking> {
        self.rankings.iter().filter(|ranking| !ranking.is_eligible)
    }
}

/// Window a snapshot covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Success {
        agent_count: usize,
        conversation_count: usize,
    },
    Failed {
        message: String,
    },
}

impl RefreshOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            RefreshOutcome::Success { .. } => "success",
            RefreshOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshLogEntry {
    pub channel: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub agent_count: Option<i32>,
    pub conversation_count: Option<i32>,
    pub error_msg: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub display_name: String,
    pub snapshot_at: DateTime<Utc>,
    pub conversation_count: i32,
    pub composite_score: f64,
    pub rank: i32,
    pub is_eligible: bool,
}
