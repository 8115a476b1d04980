//! Phrase similarity scoring
//!
//! Scores a normalised transcript against normalised phrases:
//! exact match 1.0, substring containment in either direction 0.9,
//! otherwise the Jaccard index of the two word sets.

use super::registry::{CommandRegistry, RegisteredCommand};
use std::collections::HashSet;

/// Score for an exact phrase match
pub const EXACT_SCORE: f64 = 1.0;

/// Score when one side contains the other
pub const CONTAINMENT_SCORE: f64 = 0.9;

/// Similarity between two normalised strings, in [0, 1]
pub fn similarity(transcript: &str, phrase: &str) -> f64 {
    if transcript.is_empty() || phrase.is_empty() {
        return 0.0;
    }
    if transcript == phrase {
        return EXACT_SCORE;
    }
    if transcript.contains(phrase) || phrase.contains(transcript) {
        return CONTAINMENT_SCORE;
    }
    jaccard(transcript, phrase)
}

fn jaccard(a: &str, b: &str) -> f64 {
    let a: HashSet<&str> = a.split(' ').collect();
    let b: HashSet<&str> = b.split(' ').collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// Best scoring command at or above the threshold
///
/// Only a strictly greater score replaces the current best, so the earliest
/// registered command wins ties.
pub(crate) fn best_match<'a>(
    registry: &'a CommandRegistry,
    transcript: &str,
    threshold: f64,
) -> Option<(&'a RegisteredCommand, f64)> {
    let mut best: Option<(&RegisteredCommand, f64)> = None;

    for entry in registry.entries() {
        for phrase in &entry.phrases {
            let score = similarity(transcript, phrase);
            if score < threshold {
                continue;
            }
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((entry, score)),
            }
        }
    }

    if let Some((entry, score)) = best {
        tracing::trace!("Best match '{}' with score {:.2}", entry.command.id, score);
    }
    best
}
