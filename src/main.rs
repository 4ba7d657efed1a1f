use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod aggregate;
mod config;
mod db;
mod eligibility;
mod extract;
mod models;
mod percentile;
mod qa;
mod ranking;
mod refresh;
mod report;

use config::{Channel, DatabaseConfig};
use models::{Leaderboard, RefreshOutcome, ReportingPeriod, Tier};

#[derive(Parser)]
#[command(name = "agent-leaderboard")]
#[command(about = "Multi-metric performance leaderboard for support agents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Rank agents from exported conversations
    Rank {
        #[command(flatten)]
        inputs: RankInputs,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Persist the snapshot and a refresh log entry
        #[arg(long)]
        save: bool,
    },
    /// Generate a markdown leaderboard report
    Report {
        #[command(flatten)]
        inputs: RankInputs,
        #[arg(long, default_value = "leaderboard.md")]
        out: PathBuf,
    },
    /// Show recent refreshes and the latest saved snapshot
    History {
        #[arg(long, value_enum)]
        channel: Channel,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[derive(Args)]
struct RankInputs {
    #[arg(long, value_enum)]
    channel: Channel,
    /// JSON array of conversation records
    #[arg(long)]
    conversations: PathBuf,
    /// JSON array of agents (id, name, email)
    #[arg(long)]
    agents: PathBuf,
    /// CSV with agent_name,qa_score columns
    #[arg(long)]
    qa_csv: Option<PathBuf>,
    /// Override the channel's minimum conversation count
    #[arg(long)]
    min_conversations: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agent_leaderboard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Rank {
            inputs,
            limit,
            save,
        } => {
            let started_at = Utc::now();
            let period = refresh::month_to_date(started_at);

            let leaderboard = if save {
                let pool = connect().await?;
                let result = rank_and_save(&pool, &inputs, period, started_at).await;
                let outcome = match &result {
                    Ok(leaderboard) => RefreshOutcome::Success {
                        agent_count: leaderboard.agent_count,
                        conversation_count: leaderboard.conversation_count,
                    },
                    Err(err) => {
                        let message = format!("{err:#}");
                        error!(channel = %inputs.channel, error = %message, "refresh failed");
                        RefreshOutcome::Failed { message }
                    }
                };
                let recorded = db::record_refresh(&pool, inputs.channel, started_at, &outcome).await;
                settle_refresh(inputs.channel, result, recorded)?
            } else {
                compute(&inputs)?
            };

            print_top(&leaderboard, limit);
            if save {
                println!("Snapshot saved for {}.", inputs.channel);
            }
        }
        Commands::Report { inputs, out } => {
            let period = refresh::month_to_date(Utc::now());
            let leaderboard = compute(&inputs)?;
            let report = report::build_report(inputs.channel, period, &leaderboard);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::History { channel, limit } => {
            let pool = connect().await?;
            print_history(&pool, channel, limit).await?;
        }
    }

    Ok(())
}

async fn connect() -> anyhow::Result<PgPool> {
    let config = DatabaseConfig::from_env()?;

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
        .context("failed to connect to Postgres")
}

fn compute(inputs: &RankInputs) -> anyhow::Result<Leaderboard> {
    let conversations = refresh::load_conversations(&inputs.conversations)?;
    let identities = refresh::load_identities(&inputs.agents)?;
    let qa_scores = inputs
        .qa_csv
        .as_deref()
        .map(qa::load_qa_scores)
        .transpose()?;
    let config = config::ranking_config(inputs.channel, inputs.min_conversations);

    info!(
        channel = %inputs.channel,
        conversations = conversations.len(),
        identities = identities.len(),
        qa_scores = qa_scores.as_ref().map_or(0, |scores| scores.len()),
        min_conversations = config.min_conversations,
        "ranking agents"
    );

    Ok(ranking::build_leaderboard(
        &conversations,
        &identities,
        &config,
        qa_scores.as_ref(),
    ))
}

async fn rank_and_save(
    pool: &PgPool,
    inputs: &RankInputs,
    period: ReportingPeriod,
    snapshot_at: chrono::DateTime<Utc>,
) -> anyhow::Result<Leaderboard> {
    let leaderboard = compute(inputs)?;
    let saved = db::save_leaderboard(pool, inputs.channel, period, snapshot_at, &leaderboard).await?;
    info!(
        channel = %inputs.channel,
        agents = saved,
        conversations = leaderboard.conversation_count,
        "refresh succeeded"
    );
    Ok(leaderboard)
}

/// The refresh result wins over a failure to log it; the log failure is only
/// reported.
fn settle_refresh<T>(
    channel: Channel,
    result: anyhow::Result<T>,
    recorded: anyhow::Result<()>,
) -> anyhow::Result<T> {
    if let Err(err) = recorded {
        error!(channel = %channel, error = %format!("{err:#}"), "failed to record refresh outcome");
    }
    result
}

fn print_top(leaderboard: &Leaderboard, limit: usize) {
    if leaderboard.eligible_count == 0 {
        println!(
            "No eligible agents among {} across {} conversations.",
            leaderboard.agent_count, leaderboard.conversation_count
        );
        return;
    }

    println!(
        "Top agents ({} eligible of {}, {} conversations):",
        leaderboard.eligible_count, leaderboard.agent_count, leaderboard.conversation_count
    );
    for ranking in leaderboard.eligible().take(limit) {
        println!(
            "- #{} {} [{}] composite {:.2} across {} conversations",
            ranking.rank,
            ranking.metrics.display_name,
            ranking.tier,
            ranking.composite_score,
            ranking.metrics.conversation_count
        );
    }
}

async fn print_history(pool: &PgPool, channel: Channel, limit: i64) -> anyhow::Result<()> {
    let logs = db::fetch_refresh_logs(pool, channel, limit).await?;
    if logs.is_empty() {
        println!("No refreshes recorded for {channel}.");
        return Ok(());
    }

    println!("Recent {channel} refreshes:");
    for log in &logs {
        let took = (log.completed_at - log.started_at).num_seconds();
        match log.error_msg.as_deref() {
            Some(message) => println!(
                "- [{}] {} {} ({}s): {}",
                log.channel, log.started_at, log.status, took, message
            ),
            None => println!(
                "- [{}] {} {} ({}s): {} agents from {} conversations",
                log.channel,
                log.started_at,
                log.status,
                took,
                log.agent_count.unwrap_or_default(),
                log.conversation_count.unwrap_or_default()
            ),
        }
    }

    let snapshot = db::fetch_latest_snapshot(pool, channel).await?;
    let Some(first) = snapshot.first() else {
        return Ok(());
    };

    let eligible = snapshot.iter().filter(|entry| entry.is_eligible).count();
    println!();
    println!("Latest {channel} snapshot ({}):", first.snapshot_at);
    for entry in &snapshot {
        if entry.is_eligible {
            let tier = usize::try_from(entry.rank)
                .map(|rank| ranking::tier_for_rank(rank, eligible))
                .unwrap_or(Tier::Rising);
            println!(
                "- #{} {} [{}] composite {:.2} across {} conversations",
                entry.rank, entry.display_name, tier, entry.composite_score, entry.conversation_count
            );
        } else {
            println!(
                "- unranked {} ({} conversations)",
                entry.display_name, entry.conversation_count
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_error_survives_a_failed_log_write() {
        let result: anyhow::Result<usize> = Err(anyhow::anyhow!("conversations file missing"));
        let recorded = Err(anyhow::anyhow!("refresh_logs insert failed"));

        let err = settle_refresh(Channel::Chat, result, recorded).unwrap_err();
        assert_eq!(err.to_string(), "conversations file missing");
    }

    #[test]
    fn successful_refresh_is_kept_when_logging_fails() {
        let recorded = Err(anyhow::anyhow!("refresh_logs insert failed"));

        let value = settle_refresh(Channel::Email, Ok(12usize), recorded).unwrap();
        assert_eq!(value, 12);
    }

    #[test]
    fn logged_refresh_passes_through() {
        assert_eq!(settle_refresh(Channel::Chat, Ok(3usize), Ok(())).unwrap(), 3);
    }
}
