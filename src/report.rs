use std::fmt::Write;

use crate::config::Channel;
use crate::models::{AgentRanking, Leaderboard, ReportingPeriod, Tier};

#[derive(Debug, Clone, PartialEq)]
pub struct TierSummary {
    pub tier: Tier,
    pub count: usize,
    pub avg_composite: f64,
}

/// Eligible agents per tier, best tier first. Empty tiers are kept.
pub fn summarize_by_tier(leaderboard: &Leaderboard) -> Vec<TierSummary> {
    Tier::ALL
        .iter()
        .map(|tier| {
            let scores: Vec<f64> = leaderboard
                .eligible()
                .filter(|ranking| ranking.tier == *tier)
                .map(|ranking| ranking.composite_score)
                .collect();
            TierSummary {
                tier: *tier,
                count: scores.len(),
                avg_composite: if scores.is_empty() {
                    0.0
                } else {
                    scores.iter().sum::<f64>() / scores.len() as f64
                },
            }
        })
        .collect()
}

pub fn build_report(channel: Channel, period: ReportingPeriod, leaderboard: &Leaderboard) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Support Agent Leaderboard ({channel})");
    let _ = writeln!(
        output,
        "Period {} to {}; {} conversations, {} agents, {} eligible (min {} conversations)",
        period.start.format("%Y-%m-%d"),
        period.end.format("%Y-%m-%d %H:%M UTC"),
        leaderboard.conversation_count,
        leaderboard.agent_count,
        leaderboard.eligible_count,
        leaderboard.min_conversations
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Tier Mix");

    if leaderboard.eligible_count == 0 {
        let _ = writeln!(output, "No agents met the volume threshold.");
    } else {
        for summary in summarize_by_tier(leaderboard) {
            let _ = writeln!(
                output,
                "- {} ({}): {} agents (avg composite {:.1})",
                summary.tier,
                summary.tier.color(),
                summary.count,
                summary.avg_composite
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Rankings");

    if leaderboard.eligible_count == 0 {
        let _ = writeln!(output, "No ranked agents for this period.");
    } else {
        let _ = writeln!(
            output,
            "| Rank | Tier | Agent | Conversations | P95 FRT | AHT | CX | QA | Composite |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|---|");
        for ranking in leaderboard.eligible() {
            let _ = writeln!(
                output,
                "| #{} | {} | {} | {} | {} ({}) | {} ({}) | {} ({}) | {} | {:.1} |",
                ranking.rank,
                ranking.tier,
                ranking.metrics.display_name,
                ranking.metrics.conversation_count,
                format_duration(ranking.metrics.p95_response_time_seconds),
                format_percentile(ranking.p95_response_percentile),
                format_duration(ranking.metrics.avg_handling_time_seconds),
                format_percentile(ranking.aht_percentile),
                format_percent(ranking.metrics.cx_score_percent),
                format_percentile(ranking.cx_score_percentile),
                qa_cell(ranking),
                ranking.composite_score
            );
        }
    }

    let ineligible: Vec<&AgentRanking> = leaderboard.ineligible().collect();
    if !ineligible.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Below Threshold");
        for ranking in ineligible {
            let _ = writeln!(
                output,
                "- {}: {} conversations",
                ranking.metrics.display_name, ranking.metrics.conversation_count
            );
        }
    }

    output
}

fn qa_cell(ranking: &AgentRanking) -> String {
    match (ranking.metrics.qa_score, ranking.qa_score_percentile) {
        (Some(score), Some(percentile)) => {
            format!("{score:.1} ({})", format_percentile(percentile))
        }
        (Some(score), None) => format!("{score:.1}"),
        _ => "-".to_string(),
    }
}

/// `42s`, `3m 5s`, `2h 10m`. Rounds to whole seconds before splitting, so
/// 119.6 is `2m`, never `1m 60s`.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.round() as i64;
    if total < 60 {
        return format!("{total}s");
    }

    let mins = total / 60;
    let secs = total % 60;
    if mins < 60 {
        return if secs > 0 {
            format!("{mins}m {secs}s")
        } else {
            format!("{mins}m")
        };
    }

    let hours = mins / 60;
    let remaining = mins % 60;
    if remaining > 0 {
        format!("{hours}h {remaining}m")
    } else {
        format!("{hours}h")
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{}%", value.round() as i64)
}

pub fn format_percentile(value: f64) -> String {
    let rounded = value.round() as i64;
    let suffix = match (rounded % 10, rounded % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{rounded}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentMetrics, ConversationRecord};
    use crate::ranking::{build_leaderboard, RankingConfig};
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn ranking(name: &str, rank: usize, tier: Tier, composite: f64, eligible: bool) -> AgentRanking {
        AgentRanking {
            metrics: AgentMetrics {
                agent_id: name.to_lowercase(),
                display_name: name.to_string(),
                email: None,
                conversation_count: if eligible { 140 } else { 12 },
                p95_response_time_seconds: 95.0,
                avg_handling_time_seconds: 3_900.0,
                cx_score_percent: 87.5,
                qa_score: None,
            },
            p95_response_percentile: 50.0,
            aht_percentile: 50.0,
            cx_score_percentile: 50.0,
            qa_score_percentile: None,
            composite_score: composite,
            rank,
            is_eligible: eligible,
            tier,
        }
    }

    fn period() -> ReportingPeriod {
        ReportingPeriod {
            start: Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 2, 14, 6, 0, 0).unwrap(),
        }
    }

    #[test]
    fn durations_format_like_the_dashboard() {
        assert_eq!(format_duration(42.4), "42s");
        assert_eq!(format_duration(185.0), "3m 5s");
        assert_eq!(format_duration(180.0), "3m");
        assert_eq!(format_duration(7_800.0), "2h 10m");
        assert_eq!(format_duration(7_200.0), "2h");
    }

    #[test]
    fn rounding_carries_into_the_next_unit() {
        assert_eq!(format_duration(59.6), "1m");
        assert_eq!(format_duration(119.6), "2m");
        assert_eq!(format_duration(3_599.7), "1h");
        assert_eq!(format_duration(95.4), "1m 35s");
    }

    #[test]
    fn percentiles_get_ordinal_suffixes() {
        assert_eq!(format_percentile(1.0), "1st");
        assert_eq!(format_percentile(2.2), "2nd");
        assert_eq!(format_percentile(3.0), "3rd");
        assert_eq!(format_percentile(11.0), "11th");
        assert_eq!(format_percentile(12.0), "12th");
        assert_eq!(format_percentile(13.0), "13th");
        assert_eq!(format_percentile(21.0), "21st");
        assert_eq!(format_percentile(66.7), "67th");
        assert_eq!(format_percentile(100.0), "100th");
        assert_eq!(format_percent(87.5), "88%");
    }

    #[test]
    fn tier_summary_counts_eligible_only() {
        let leaderboard = Leaderboard {
            rankings: vec![
                ranking("Ada", 1, Tier::Silver, 80.0, true),
                ranking("Ben", 2, Tier::Bronze, 50.0, true),
                ranking("Cy", 3, Tier::Rising, 10.0, true),
                ranking("Dee", 0, Tier::Rising, 0.0, false),
            ],
            agent_count: 4,
            eligible_count: 3,
            conversation_count: 432,
            min_conversations: 100,
        };

        let summary = summarize_by_tier(&leaderboard);
        assert_eq!(summary.len(), 5);
        assert_eq!(summary[2].tier, Tier::Silver);
        assert_eq!(summary[2].count, 1);
        assert_eq!(summary[4].tier, Tier::Rising);
        assert_eq!(summary[4].count, 1);
        assert_eq!(summary[4].avg_composite, 10.0);
        assert_eq!(summary[0].count, 0);
    }

    #[test]
    fn report_lists_ranked_and_threshold_agents() {
        let leaderboard = Leaderboard {
            rankings: vec![
                ranking("Ada", 1, Tier::Silver, 80.0, true),
                ranking("Dee", 0, Tier::Rising, 0.0, false),
            ],
            agent_count: 2,
            eligible_count: 1,
            conversation_count: 152,
            min_conversations: 100,
        };

        let report = build_report(Channel::Chat, period(), &leaderboard);
        assert!(report.contains("# Support Agent Leaderboard (chat)"));
        assert!(report.contains("Period 2026-02-01 to 2026-02-14 06:00 UTC"));
        assert!(report.contains("152 conversations, 2 agents, 1 eligible (min 100 conversations)"));
        assert!(report.contains("| #1 | Silver | Ada | 140 | 1m 35s (50th) | 1h 5m (50th) | 88% (50th) | - | 80.0 |"));
        assert!(report.contains("## Below Threshold"));
        assert!(report.contains("- Dee: 12 conversations"));
    }

    #[test]
    fn empty_leaderboard_reports_nothing_ranked() {
        let leaderboard = Leaderboard {
            rankings: Vec::new(),
            agent_count: 0,
            eligible_count: 0,
            conversation_count: 0,
            min_conversations: 30,
        };

        let report = build_report(Channel::Email, period(), &leaderboard);
        assert!(report.contains("No agents met the volume threshold."));
        assert!(report.contains("No ranked agents for this period."));
        assert!(!report.contains("## Below Threshold"));
        assert!(report.contains("(min 30 conversations)"));
    }

    #[test]
    fn header_shows_the_threshold_actually_applied() {
        let conversations: Vec<ConversationRecord> = (0..5)
            .map(|n| ConversationRecord {
                teammate_ids: vec!["7".to_string()],
                last_assignment_at: Some(1_000),
                first_admin_reply_at: Some(1_060 + n),
                handling_time_seconds: Some(300.0),
                satisfaction_rating: Some(serde_json::json!(5)),
                ..Default::default()
            })
            .collect();
        let config = RankingConfig {
            min_conversations: 5,
            ..RankingConfig::default()
        };

        let leaderboard = build_leaderboard(&conversations, &HashMap::new(), &config, None);
        let report = build_report(Channel::Chat, period(), &leaderboard);

        assert!(report.contains("5 conversations, 1 agents, 1 eligible (min 5 conversations)"));
        assert!(!report.contains("min 100 conversations"));
        assert!(report.contains("| #1 | Rising | Agent 7 | 5 |"));
    }
}
