use std::collections::HashSet;
use std::env;
use std::fmt;

use clap::ValueEnum;

use crate::aggregate::default_excluded_agent_ids;
use crate::ranking::RankingConfig;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Logical support channel. Each one is ranked separately with its own
/// volume threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Channel {
    Chat,
    Email,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Chat => "chat",
            Channel::Email => "email",
        }
    }

    pub fn min_conversations(self) -> usize {
        match self {
            Channel::Chat => 100,
            Channel::Email => 30,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL"))?;

        let max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?,
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            url,
            max_connections,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

/// Channel threshold unless overridden, exclusion list from
/// `LEADERBOARD_EXCLUDED_AGENT_IDS` when set.
pub fn ranking_config(channel: Channel, min_conversations: Option<usize>) -> RankingConfig {
    let excluded_agent_ids = env::var("LEADERBOARD_EXCLUDED_AGENT_IDS")
        .ok()
        .map(|raw| parse_id_list(&raw))
        .unwrap_or_else(default_excluded_agent_ids);

    RankingConfig {
        min_conversations: min_conversations.unwrap_or_else(|| channel.min_conversations()),
        excluded_agent_ids,
    }
}

pub fn parse_id_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}
