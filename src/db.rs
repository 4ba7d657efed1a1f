use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::config::Channel;
use crate::models::{
    Leaderboard, RefreshLogEntry, RefreshOutcome, ReportingPeriod, SnapshotEntry,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Upserts every ranked agent and its snapshot row in one transaction.
///
/// A channel-scoped advisory lock keeps two refreshes of the same channel
/// from interleaving their writes.
pub async fn save_leaderboard(
    pool: &PgPool,
    channel: Channel,
    period: ReportingPeriod,
    snapshot_at: DateTime<Utc>,
    leaderboard: &Leaderboard,
) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(channel.as_str())
        .execute(&mut *tx)
        .await
        .context("failed to take channel refresh lock")?;

    for ranking in &leaderboard.rankings {
        let metrics = &ranking.metrics;

        let agent_id: Uuid = sqlx::query(
            r#"
            INSERT INTO agent_leaderboard.agents (id, external_id, display_name, email)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (external_id) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                email = EXCLUDED.email,
                updated_at = now()
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&metrics.agent_id)
        .bind(&metrics.display_name)
        .bind(&metrics.email)
        .fetch_one(&mut *tx)
        .await?
        .get("id");

        sqlx::query(
            r#"
            INSERT INTO agent_leaderboard.ranking_snapshots
            (id, agent_id, channel, period_start, period_end, snapshot_at,
             conversation_count, p95_response_time_seconds, avg_handling_time_seconds,
             cx_score_percent, qa_score, p95_response_percentile, aht_percentile,
             cx_score_percentile, qa_score_percentile, composite_score, rank, is_eligible)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (agent_id, snapshot_at, channel) DO UPDATE
            SET conversation_count = EXCLUDED.conversation_count,
                p95_response_time_seconds = EXCLUDED.p95_response_time_seconds,
                avg_handling_time_seconds = EXCLUDED.avg_handling_time_seconds,
                cx_score_percent = EXCLUDED.cx_score_percent,
                qa_score = EXCLUDED.qa_score,
                p95_response_percentile = EXCLUDED.p95_response_percentile,
                aht_percentile = EXCLUDED.aht_percentile,
                cx_score_percentile = EXCLUDED.cx_score_percentile,
                qa_score_percentile = EXCLUDED.qa_score_percentile,
                composite_score = EXCLUDED.composite_score,
                rank = EXCLUDED.rank,
                is_eligible = EXCLUDED.is_eligible
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(agent_id)
        .bind(channel.as_str())
        .bind(period.start)
        .bind(period.end)
        .bind(snapshot_at)
        .bind(to_i32(metrics.conversation_count, "conversation count")?)
        .bind(metrics.p95_response_time_seconds)
        .bind(metrics.avg_handling_time_seconds)
        .bind(metrics.cx_score_percent)
        .bind(metrics.qa_score)
        .bind(ranking.p95_response_percentile)
        .bind(ranking.aht_percentile)
        .bind(ranking.cx_score_percentile)
        .bind(ranking.qa_score_percentile)
        .bind(ranking.composite_score)
        .bind(to_i32(ranking.rank, "rank")?)
        .bind(ranking.is_eligible)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    debug!(channel = %channel, rows = leaderboard.rankings.len(), "saved ranking snapshot");

    Ok(leaderboard.rankings.len())
}

pub async fn record_refresh(
    pool: &PgPool,
    channel: Channel,
    started_at: DateTime<Utc>,
    outcome: &RefreshOutcome,
) -> anyhow::Result<()> {
    let (agent_count, conversation_count, error_msg) = match outcome {
        RefreshOutcome::Success {
            agent_count,
            conversation_count,
        } => (
            Some(to_i32(*agent_count, "agent count")?),
            Some(to_i32(*conversation_count, "conversation count")?),
            None,
        ),
        RefreshOutcome::Failed { message } => (None, None, Some(message.as_str())),
    };

    sqlx::query(
        r#"
        INSERT INTO agent_leaderboard.refresh_logs
        (id, channel, status, started_at, completed_at, agent_count, conversation_count, error_msg)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(channel.as_str())
    .bind(outcome.status())
    .bind(started_at)
    .bind(Utc::now())
    .bind(agent_count)
    .bind(conversation_count)
    .bind(error_msg)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn fetch_refresh_logs(
    pool: &PgPool,
    channel: Channel,
    limit: i64,
) -> anyhow::Result<Vec<RefreshLogEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT channel, status, started_at, completed_at,
               agent_count, conversation_count, error_msg
        FROM agent_leaderboard.refresh_logs
        WHERE channel = $1
        ORDER BY started_at DESC
        LIMIT $2
        "#,
    )
    .bind(channel.as_str())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| RefreshLogEntry {
            channel: row.get("channel"),
            status: row.get("status"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
            agent_count: row.get("agent_count"),
            conversation_count: row.get("conversation_count"),
            error_msg: row.get("error_msg"),
        })
        .collect())
}

/// Rows of the most recent snapshot for a channel, eligible agents by rank
/// first.
pub async fn fetch_latest_snapshot(
    pool: &PgPool,
    channel: Channel,
) -> anyhow::Result<Vec<SnapshotEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT a.display_name, s.snapshot_at, s.conversation_count,
               s.composite_score, s.rank, s.is_eligible
        FROM agent_leaderboard.ranking_snapshots s
        JOIN agent_leaderboard.agents a ON a.id = s.agent_id
        WHERE s.channel = $1
          AND s.snapshot_at = (
              SELECT MAX(snapshot_at)
              FROM agent_leaderboard.ranking_snapshots
              WHERE channel = $1
          )
        ORDER BY s.is_eligible DESC, s.rank ASC, a.display_name ASC
        "#,
    )
    .bind(channel.as_str())
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| SnapshotEntry {
            display_name: row.get("display_name"),
            snapshot_at: row.get("snapshot_at"),
            conversation_count: row.get("conversation_count"),
            composite_score: row.get("composite_score"),
            rank: row.get("rank"),
            is_eligible: row.get("is_eligible"),
        })
        .collect())
}

fn to_i32(value: usize, what: &str) -> anyhow::Result<i32> {
    i32::try_from(value).with_context(|| format!("{what} {value} does not fit the snapshot schema"))
}
