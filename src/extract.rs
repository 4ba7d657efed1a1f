use crate::models::ConversationRecord;

/// Handling times above four hours are stuck or still-open conversations.
pub const MAX_HANDLING_TIME_SECONDS: f64 = 4.0 * 60.0 * 60.0;

const MIN_RATING: f64 = 1.0;
const MAX_RATING: f64 = 5.0;

/// Cleaned per-conversation measurements. `None` means "not a sample".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConversationMetrics {
    pub response_latency_seconds: Option<f64>,
    pub handling_time_seconds: Option<f64>,
    pub satisfaction_rating: Option<f64>,
}

pub fn extract_metrics(record: &ConversationRecord) -> ConversationMetrics {
    ConversationMetrics {
        response_latency_seconds: response_latency(record),
        handling_time_seconds: handling_time(record),
        satisfaction_rating: satisfaction_rating(record),
    }
}

/// First human reply minus the human assignment. The bot's earlier
/// auto-assignment is never used.
fn response_latency(record: &ConversationRecord) -> Option<f64> {
    let assigned = record.last_assignment_at.filter(|ts| *ts != 0);
    let replied = record.first_admin_reply_at.filter(|ts| *ts != 0);

    let latency = match (assigned, replied) {
        (Some(assigned), Some(replied)) => replied.checked_sub(assigned)? as f64,
        (None, None) => record.response_latency_seconds?,
        _ => return None,
    };

    // Reassigned conversations can reply before the last assignment.
    (latency.is_finite() && latency >= 0.0).then_some(latency)
}

fn handling_time(record: &ConversationRecord) -> Option<f64> {
    record
        .handling_time_seconds
        .filter(|secs| secs.is_finite() && *secs >= 0.0 && *secs <= MAX_HANDLING_TIME_SECONDS)
}

fn satisfaction_rating(record: &ConversationRecord) -> Option<f64> {
    record
        .satisfaction_rating
        .as_ref()
        .and_then(serde_json::Value::as_f64)
        .filter(|rating| (MIN_RATING..=MAX_RATING).contains(rating))
}
