use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Datelike, TimeZone, Utc};

use crate::models::{AgentIdentity, ConversationRecord, ReportingPeriod};

/// Start of the current UTC month up to `now`.
pub fn month_to_date(now: DateTime<Utc>) -> ReportingPeriod {
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);

    ReportingPeriod { start, end: now }
}

pub fn load_conversations(path: &Path) -> anyhow::Result<Vec<ConversationRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read conversations {}", path.display()))?;
    parse_conversations(&raw).with_context(|| format!("invalid conversations in {}", path.display()))
}

pub fn parse_conversations(raw: &str) -> anyhow::Result<Vec<ConversationRecord>> {
    Ok(serde_json::from_str(raw)?)
}

pub fn load_identities(path: &Path) -> anyhow::Result<HashMap<String, AgentIdentity>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read agents {}", path.display()))?;
    parse_identities(&raw).with_context(|| format!("invalid agents in {}", path.display()))
}

/// Identity list keyed by agent id; the last entry wins on duplicates.
pub fn parse_identities(raw: &str) -> anyhow::Result<HashMap<String, AgentIdentity>> {
    let agents: Vec<AgentIdentity> = serde_json::from_str(raw)?;
    Ok(agents
        .into_iter()
        .map(|agent| (agent.id.clone(), agent))
        .collect())
}
