//! Heuristic chunk quality scoring.
//!
//! A score starts at 1.0 and is multiplied down by each problem found. The
//! score is descriptive only: low-quality chunks are still persisted.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use chunklab_core::DocumentChunk;

const MIN_CHARS: usize = 50;
const SHORT_PENALTY: f64 = 0.5;
const CAPITAL_PENALTY: f64 = 0.8;
const TERMINAL_PENALTY: f64 = 0.8;
const REPETITION_MIN_WORDS: usize = 10;
const REPETITION_RATIO: f64 = 0.3;
const REPETITION_PENALTY: f64 = 0.6;
const TOKENS_PER_WORD: f64 = 0.75;
const TOKEN_DEVIATION: f64 = 0.5;
const TOKEN_PENALTY: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityIssue {
    TooShort,
    NoLeadingCapital,
    NoTerminalPunctuation,
    Repetitive,
    TokenCountMismatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkQuality {
    pub score: f64,
    pub issues: Vec<QualityIssue>,
}

pub fn score_chunk(chunk: &DocumentChunk) -> ChunkQuality {
    score_text(&chunk.content, chunk.token_count)
}

pub fn score_text(content: &str, token_count: usize) -> ChunkQuality {
    let text = content.trim();
    let mut score = 1.0;
    let mut issues = Vec::new();
    let mut penalize = |issue, factor: f64| {
        score *= factor;
        issues.push(issue);
    };

    if text.chars().count() < MIN_CHARS {
        penalize(QualityIssue::TooShort, SHORT_PENALTY);
    }
    if !text.chars().next().is_some_and(char::is_uppercase) {
        penalize(QualityIssue::NoLeadingCapital, CAPITAL_PENALTY);
    }
    if !text.ends_with(['.', '!', '?']) {
        penalize(QualityIssue::NoTerminalPunctuation, TERMINAL_PENALTY);
    }

    let words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    if words.len() > REPETITION_MIN_WORDS {
        let unique: HashSet<&str> = words.iter().map(String::as_str).collect();
        if (unique.len() as f64 / words.len() as f64) < REPETITION_RATIO {
            penalize(QualityIssue::Repetitive, REPETITION_PENALTY);
        }
    }

    let expected = words.len() as f64 * TOKENS_PER_WORD;
    if expected > 0.0 && ((token_count as f64 - expected).abs() / expected) > TOKEN_DEVIATION {
        penalize(QualityIssue::TokenCountMismatch, TOKEN_PENALTY);
    }

    ChunkQuality { score, issues }
}

/// Mean score over a set of chunks; `None` when there are none.
pub fn average_score(chunks: &[DocumentChunk]) -> Option<f64> {
    if chunks.is_empty() {
        return None;
    }
    let total: f64 = chunks.iter().map(|c| score_chunk(c).score).sum();
    Some(total / chunks.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_chunk_scores_full() {
        let text = "The committee approved the revised budget after a long debate about priorities.";
        let words = text.split_whitespace().count();
        let q = score_text(text, (words as f64 * 0.75).round() as usize);
        assert_eq!(q.score, 1.0);
        assert!(q.issues.is_empty());
    }

    #[test]
    fn penalties_multiply() {
        let q = score_text("lowercase fragment without end", 4);
        assert_eq!(
            q.issues,
            vec![
                QualityIssue::TooShort,
                QualityIssue::NoLeadingCapital,
                QualityIssue::NoTerminalPunctuation
            ]
        );
        assert!((q.score - 0.5 * 0.8 * 0.8).abs() < 1e-9);
    }

    #[test]
    fn repetition_is_detected() {
        let text = format!("{}end.", "Cat cat cat dog dog ".repeat(6));
        let words = text.split_whitespace().count();
        let q = score_text(&text, (words as f64 * 0.75) as usize);
        assert!(q.issues.contains(&QualityIssue::Repetitive));
    }

    #[test]
    fn token_mismatch_is_detected() {
        let text = "Every word in this sentence is short and the total is plenty long enough.";
        let q = score_text(text, 200);
        assert_eq!(q.issues, vec![QualityIssue::TokenCountMismatch]);
        assert!((q.score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn empty_input_has_no_average() {
        assert_eq!(average_score(&[]), None);
    }
}
