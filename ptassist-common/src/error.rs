//! Error types and utilities for the ptassist toolkit
//!
//! Provides the shared error taxonomy and fuzzy matching for transport mode names.

use strsim::{jaro_winkler, normalized_levenshtein};
use thiserror::Error;

/// Find the best fuzzy match using character-based scoring with a prefix bonus
///
/// Jaro-Winkler (70%) is combined with normalized Levenshtein (30%). A strong
/// shared prefix adds up to 20%, and compound candidates (`light_rail`) earn a
/// bonus when the input closely matches one of their parts.
///
/// Minimum threshold: 0.7 similarity
fn find_best_fuzzy_match(input: &str, candidates: &[&str]) -> Option<String> {
    let input_lower = input.to_lowercase();
    let mut best_match = None;
    let mut best_score = 0.0f64;

    // Mode names are short, so the bar sits a little higher than for region names.
    let min_threshold = 0.7;

    for candidate in candidates {
        let candidate_lower = candidate.to_lowercase();

        let jw_score = jaro_winkler(&input_lower, &candidate_lower);
        let lev_score = normalized_levenshtein(&input_lower, &candidate_lower);
        let combined_score = (jw_score * 0.7) + (lev_score * 0.3);

        let mut semantic_bonus = 0.0;

        let prefix_len = input_lower.chars().count().min(5);
        if prefix_len >= 3 {
            let input_prefix = input_lower.chars().take(prefix_len).collect::<String>();
            let candidate_prefix = candidate_lower.chars().take(prefix_len).collect::<String>();

            let prefix_similarity = normalized_levenshtein(&input_prefix, &candidate_prefix);
            if prefix_similarity > 0.7 {
                semantic_bonus += 0.2 * prefix_similarity;
            }
        }

        if candidate_lower.contains('_') {
            for part in candidate_lower.split('_') {
                if part.len() >= 4 {
                    let part_similarity = jaro_winkler(&input_lower, part);
                    if part_similarity > 0.85 {
                        semantic_bonus += 0.12 * part_similarity;
                    }
                }
            }
        }

        let final_score = combined_score + semantic_bonus;

        if final_score >= min_threshold && final_score > best_score {
            best_score = final_score;
            best_match = Some(candidate.to_string());
        }
    }

    best_match
}

/// Suggest a correction for a potentially misspelled name among `candidates`
///
/// Returns `None` for an exact (case-insensitive) match or when nothing is close enough.
pub fn suggest_correction(input: &str, candidates: &[&str]) -> Option<String> {
    if candidates.iter().any(|c| c.eq_ignore_ascii_case(input)) {
        return None;
    }

    // "light-rail" and "light rail" are common spellings of `light_rail`
    let normalized = input.replace(['-', ' '], "_");
    if let Some(exact) = candidates.iter().find(|c| c.eq_ignore_ascii_case(&normalized)) {
        return Some(exact.to_string());
    }

    find_best_fuzzy_match(input, candidates)
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{s}'?)"),
        None => String::new(),
    }
}

/// Main error type for ptassist operations
#[derive(Debug, Error)]
pub enum Error {
    /// A relation changed between planning an edit set and applying it
    #[error("Relation {relation} no longer matches the planned snapshot; replan from a fresh scan")]
    StaleSnapshot { relation: i64 },

    /// A referenced node, way or relation is not loaded
    #[error("{0} not found in dataset")]
    PrimitiveNotFound(String),

    /// The node is not a highway or railway stop position
    #[error("Node {0} is not a highway or railway stop position")]
    NotAStopPosition(i64),

    /// Transport mode name not recognized
    #[error("Unknown transport mode '{name}'{}", did_you_mean(.suggestion))]
    UnknownMode {
        name: String,
        suggestion: Option<String>,
    },

    /// Invalid parameters or malformed data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unreadable or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dataset could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Cancelled through a cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Stale snapshots are recovered from by replanning; everything else is final.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::StaleSnapshot { .. })
    }
}

/// Convenience result type for ptassist operations
pub type Result<T> = std::result::Result<T, Error>;
