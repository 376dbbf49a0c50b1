//! Text matchers
//!
//! Three independent strategies for judging which tags are present in a
//! piece of text. All of them consume a [`TagUniverse`]; when the universe
//! carries synonyms, matching stops at the first synonym that hits and the
//! canonical tag is emitted, never the synonym itself.
//!
//! The matchers are deliberately imperfect and cheap; the pipeline layers
//! them over different tag pools and thresholds rather than trying to make
//! any single one precise.

use crate::models::TagUniverse;
use strsim::levenshtein;

/// Fuzzy-match tags against the text tokens.
///
/// Tokens are the title plus the space-split content words. A tag matches
/// if any token scores within `threshold` (0.0 = exact only, lower =
/// stricter). Scores are normalized edit distances with a substring bonus,
/// so "finance" scores well against "financing".
pub fn fuzzy_match(
    title: &str,
    content: &str,
    universe: &TagUniverse,
    threshold: f64,
) -> Vec<String> {
    let tokens = tokenize(title, content);
    let mut matched = Vec::new();

    for (tag, terms) in universe.candidates() {
        // First synonym that hits wins for this tag
        let hit = terms.iter().any(|term| {
            tokens
                .iter()
                .any(|token| fuzzy_score(term, token) <= threshold)
        });
        if hit {
            matched.push(tag.to_string());
        }
    }

    matched
}

/// Distance-match tags against the text tokens.
///
/// The distance between two words is the count of mismatched aligned
/// characters plus the absolute length difference. A tag matches if any
/// token is within `threshold` of any of its candidate terms.
pub fn distance_match(
    title: &str,
    content: &str,
    universe: &TagUniverse,
    threshold: usize,
) -> Vec<String> {
    let tokens = tokenize(title, content);
    let mut matched = Vec::new();

    for (tag, terms) in universe.candidates() {
        let hit = terms.iter().any(|term| {
            tokens
                .iter()
                .any(|token| char_distance(term, token) <= threshold)
        });
        if hit {
            matched.push(tag.to_string());
        }
    }

    matched
}

/// Extract the tags a completion model selected from its free-text reply.
///
/// The reply is scanned for substring occurrences of each candidate tag;
/// anything else in the reply is ignored. An empty or malformed reply
/// simply yields no matches.
pub fn parse_model_selection(response: &str, universe: &TagUniverse) -> Vec<String> {
    let response = response.to_lowercase();
    universe
        .tags()
        .into_iter()
        .filter(|tag| response.contains(&tag.to_lowercase()))
        .map(|tag| tag.to_string())
        .collect()
}

/// Title plus space-split content words
fn tokenize<'a>(title: &'a str, content: &'a str) -> Vec<&'a str> {
    let mut tokens = vec![title];
    tokens.extend(content.split(' ').filter(|t| !t.is_empty()));
    tokens
}

/// Normalized fuzzy score in [0, 1]; lower is a better match.
fn fuzzy_score(pattern: &str, token: &str) -> f64 {
    if pattern.is_empty() || token.is_empty() {
        return 1.0;
    }
    if pattern == token {
        return 0.0;
    }

    let pattern_len = pattern.chars().count();
    let token_len = token.chars().count();
    let max_len = pattern_len.max(token_len) as f64;

    // Substring occurrences score on length difference alone, at half
    // weight, so "auto" sits well inside "autos"
    if token.contains(pattern) || pattern.contains(token) {
        let diff = pattern_len.abs_diff(token_len) as f64;
        return diff / max_len * 0.5;
    }

    levenshtein(pattern, token) as f64 / max_len
}

/// Mismatched aligned characters plus absolute length difference
fn char_distance(a: &str, b: &str) -> usize {
    let mismatches = a
        .chars()
        .zip(b.chars())
        .filter(|(x, y)| x != y)
        .count();
    mismatches + a.chars().count().abs_diff(b.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn flat(tags: &[&str]) -> TagUniverse {
        TagUniverse::Flat(tags.iter().map(|s| s.to_string()).collect())
    }

    fn with_synonyms(entries: &[(&str, &[&str])]) -> TagUniverse {
        let mut map = BTreeMap::new();
        for (tag, syns) in entries {
            map.insert(
                tag.to_string(),
                syns.iter().map(|s| s.to_string()).collect(),
            );
        }
        TagUniverse::WithSynonyms(map)
    }

    #[test]
    fn fuzzy_matches_exact_token() {
        let matched = fuzzy_match(
            "budget meeting",
            "quarterly finance review",
            &flat(&["finance", "sports"]),
            0.3,
        );
        assert_eq!(matched, vec!["finance".to_string()]);
    }

    #[test]
    fn fuzzy_matches_near_token_with_loose_threshold() {
        // "financing" is within a loose threshold of "finance", but not a
        // tight one
        let universe = flat(&["finance"]);
        let loose = fuzzy_match("budget", "financing the quarter", &universe, 0.4);
        assert_eq!(loose, vec!["finance".to_string()]);

        let tight = fuzzy_match("budget", "financing the quarter", &universe, 0.1);
        assert!(tight.is_empty());
    }

    #[test]
    fn fuzzy_never_returns_tags_outside_the_universe() {
        let matched = fuzzy_match(
            "payroll update",
            "payroll numbers are in",
            &flat(&["finance", "sports"]),
            0.3,
        );
        assert!(matched.is_empty());
    }

    #[test]
    fn fuzzy_emits_canonical_tag_for_synonym_hit() {
        let universe = with_synonyms(&[("car", &["auto", "vehicle"])]);
        let matched = fuzzy_match("traffic", "new auto rules announced", &universe, 0.3);
        assert_eq!(matched, vec!["car".to_string()]);
    }

    #[test]
    fn fuzzy_synonym_miss_yields_nothing() {
        let universe = with_synonyms(&[("car", &["auto", "vehicle"])]);
        let matched = fuzzy_match("weather", "sunny skies all week", &universe, 0.2);
        assert!(matched.is_empty());
    }

    #[test]
    fn fuzzy_tag_with_empty_synonym_list_cannot_match() {
        let universe = with_synonyms(&[("car", &[] as &[&str])]);
        let matched = fuzzy_match("car", "car car car", &universe, 0.0);
        assert!(matched.is_empty());
    }

    #[test]
    fn distance_accepts_small_edits_and_length_drift() {
        // "finances" vs "finance": 0 aligned mismatches + 1 length diff
        let matched = distance_match(
            "report",
            "the finances look good",
            &flat(&["finance"]),
            1,
        );
        assert_eq!(matched, vec!["finance".to_string()]);
    }

    #[test]
    fn distance_rejects_beyond_threshold() {
        let matched = distance_match(
            "report",
            "the finances look good",
            &flat(&["sports"]),
            2,
        );
        assert!(matched.is_empty());
    }

    #[test]
    fn char_distance_counts_mismatches_and_length_difference() {
        assert_eq!(char_distance("finance", "finance"), 0);
        assert_eq!(char_distance("finance", "finances"), 1);
        assert_eq!(char_distance("cat", "car"), 1);
        assert_eq!(char_distance("cat", "dog"), 3);
        assert_eq!(char_distance("ab", "abcdef"), 4);
    }

    #[test]
    fn model_selection_only_returns_supplied_tags() {
        let universe = flat(&["finance", "sports"]);
        let matched = parse_model_selection(
            "The applicable tags are: Finance. Also maybe politics.",
            &universe,
        );
        assert_eq!(matched, vec!["finance".to_string()]);
    }

    #[test]
    fn model_selection_of_empty_reply_is_empty() {
        let universe = flat(&["finance"]);
        assert!(parse_model_selection("", &universe).is_empty());
    }

    #[test]
    fn matchers_keep_restriction_pools_disjoint() {
        // A matcher invoked with one pool can only ever emit from that pool
        let public: BTreeSet<String> = ["finance".to_string()].into_iter().collect();
        let restricted: BTreeSet<String> = ["payroll".to_string()].into_iter().collect();

        let matched = fuzzy_match(
            "payroll",
            "payroll finance",
            &TagUniverse::Flat(public.clone()),
            0.2,
        );
        assert!(matched.iter().all(|t| public.contains(t)));
        assert!(matched.iter().all(|t| !restricted.contains(t)));
    }
}
