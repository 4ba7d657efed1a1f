use std::io::Read;
use std::path::Path;

use anyhow::Context;
use csv::{StringRecord, Trim};
use serde::Deserialize;

use crate::ranking::QaScores;

#[derive(Debug, Clone, PartialEq)]
pub struct QaScoreEntry {
    pub agent_name: String,
    pub qa_score: f64,
}

#[derive(Deserialize)]
struct QaRow {
    #[serde(default)]
    agent_name: Option<String>,
    #[serde(default)]
    qa_score: Option<String>,
}

/// Reads `agent_name,qa_score` rows. Header spelling is forgiving
/// ("Agent Name" works); rows without a name or a numeric score are skipped.
/// A score only needs to start with a number, so `87.5 pts` reads as 87.5.
pub fn parse_qa_scores<R: Read>(input: R) -> anyhow::Result<Vec<QaScoreEntry>> {
    let mut reader = csv::ReaderBuilder::new().trim(Trim::All).from_reader(input);

    let headers: StringRecord = reader
        .headers()
        .context("failed to read QA CSV header")?
        .iter()
        .map(normalize_header)
        .collect();
    reader.set_headers(headers);

    let mut entries = Vec::new();
    for (index, result) in reader.deserialize::<QaRow>().enumerate() {
        let row = result.with_context(|| format!("CSV parse error on data row {}", index + 1))?;

        let Some(name) = row.agent_name.filter(|name| !name.is_empty()) else {
            continue;
        };
        let Some(score) = row
            .qa_score
            .as_deref()
            .and_then(parse_leading_number)
            .filter(|score| score.is_finite())
        else {
            continue;
        };

        entries.push(QaScoreEntry {
            agent_name: name,
            qa_score: score,
        });
    }

    Ok(entries)
}

pub fn load_qa_scores(path: &Path) -> anyhow::Result<QaScores> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open QA scores {}", path.display()))?;
    let entries = parse_qa_scores(file)?;

    if entries.is_empty() {
        anyhow::bail!("No valid QA scores found in {}", path.display());
    }

    Ok(qa_scores_to_map(entries))
}

/// Later rows win when a name repeats.
pub fn qa_scores_to_map(entries: Vec<QaScoreEntry>) -> QaScores {
    entries
        .into_iter()
        .map(|entry| (entry.agent_name, entry.qa_score))
        .collect()
}

/// Longest numeric prefix of `raw`, ignoring anything after it.
fn parse_leading_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_start();
    let end = trimmed
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .unwrap_or(trimmed.len());

    (1..=end)
        .rev()
        .find_map(|len| trimmed[..len].parse::<f64>().ok())
}

fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}
