//! Fuzzy lens lookup by name and manufacturer.
//!
//! Scoring weights:
//! - Name match quality: 70%
//! - Manufacturer match quality: 30%

use serde::{Deserialize, Serialize};
use strsim::{jaro_winkler, normalized_levenshtein};

use crate::models::Lens;

/// Minimum score to be returned.
const MIN_SCORE: f64 = 0.45;

/// A lens ranked against a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LensMatch {
    pub id: String,
    pub name: String,
    pub manufacturer: String,
    /// Overall score (0.0 - 1.0)
    pub score: f64,
}

/// Rank lenses against a free-text query, best first.
pub fn search_lenses(lenses: &[Lens], query: &str, limit: usize) -> Vec<LensMatch> {
    let query = query.trim().to_lowercase();
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut matches: Vec<LensMatch> = lenses
        .iter()
        .map(|lens| LensMatch {
            id: lens.id.clone(),
            name: lens.name.clone(),
            manufacturer: lens.manufacturer.clone(),
            score: score_lens(lens, &query),
        })
        .filter(|m| m.score >= MIN_SCORE)
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(limit);
    matches
}

fn score_lens(lens: &Lens, query: &str) -> f64 {
    let name = lens.name.to_lowercase();
    let manufacturer = lens.manufacturer.to_lowercase();

    // Query names the lens outright, possibly with the manufacturer
    if !name.is_empty() && (query.contains(&name) || name.contains(query)) {
        return 1.0;
    }

    let name_score = fuzzy_match(query, &name);
    let manufacturer_score = if manufacturer.is_empty() {
        0.0
    } else if query.contains(&manufacturer) {
        1.0
    } else {
        fuzzy_match(query, &manufacturer)
    };

    name_score * 0.70 + manufacturer_score * 0.30
}

/// Best of Jaro-Winkler and normalized Levenshtein similarity.
fn fuzzy_match(a: &str, b: &str) -> f64 {
    if b.is_empty() {
        return 0.0;
    }
    jaro_winkler(a, b).max(normalized_levenshtein(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<Lens> {
        vec![
            Lens::new("1", "Alcon", "AcrySof IQ PanOptix"),
            Lens::new("2", "Zeiss", "AT LISA tri 839MP"),
            Lens::new("3", "Johnson & Johnson", "Tecnis Symfony"),
        ]
    }

    #[test]
    fn test_exact_substring_ranks_first() {
        let results = search_lenses(&catalog(), "panoptix", 5);
        assert_eq!(results[0].id, "1");
        assert_eq!(results[0].score, 1.0);
    }

    #[test]
    fn test_misspelled_name() {
        let results = search_lenses(&catalog(), "tecnis symfoni", 5);
        assert_eq!(results[0].id, "3");
        assert!(results[0].score > 0.6);
    }

    #[test]
    fn test_limit_and_empty_query() {
        assert!(search_lenses(&catalog(), "   ", 5).is_empty());
        assert!(search_lenses(&catalog(), "lisa", 0).is_empty());
        assert!(search_lenses(&catalog(), "zeiss at lisa tri 839mp", 1).len() <= 1);
    }
}
