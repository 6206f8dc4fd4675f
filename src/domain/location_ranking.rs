//! Merge, deduplicate and rank geocoder suggestions.
//!
//! Scores are additive. Text matches against the normalized query dominate,
//! then place type, then the backend's own importance estimate.

use std::cmp::Ordering;
use std::collections::HashSet;

use super::entities::LocationSuggestion;

pub const DEFAULT_LIMIT: usize = 8;
pub const MAX_LIMIT: usize = 10;
pub const MIN_QUERY_CHARS: usize = 2;

const EXACT_NAME: f64 = 100.0;
const NAME_PREFIX: f64 = 60.0;
const ADDRESS_PREFIX: f64 = 30.0;
const SUBSTRING: f64 = 20.0;
const WORD_OVERLAP: f64 = 40.0;
const IMPORTANCE: f64 = 20.0;

/// Trim, lowercase and collapse internal whitespace.
pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// True when the normalized query is long enough to send to a geocoder.
pub fn is_searchable(normalized: &str) -> bool {
    normalized.chars().count() >= MIN_QUERY_CHARS
}

pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

fn round4(value: f64) -> i64 {
    (value * 10_000.0).round() as i64
}

/// `(normalized address, lat * 1e4, lng * 1e4)`.
pub fn dedupe_key(suggestion: &LocationSuggestion) -> (String, i64, i64) {
    (
        normalize_query(&suggestion.address),
        round4(suggestion.lat),
        round4(suggestion.lng),
    )
}

/// Drop later duplicates, keeping input order.
pub fn dedupe(suggestions: Vec<LocationSuggestion>) -> Vec<LocationSuggestion> {
    let mut seen = HashSet::new();
    suggestions
        .into_iter()
        .filter(|s| seen.insert(dedupe_key(s)))
        .collect()
}

pub fn place_type_weight(place_type: Option<&str>) -> f64 {
    let Some(kind) = place_type else {
        return 0.0;
    };
    match kind.to_ascii_lowercase().as_str() {
        "aerodrome" | "airport" => 25.0,
        "station" | "railway" | "bus_station" | "train_station" | "halt" | "subway" => 22.0,
        "attraction" | "landmark" | "monument" | "museum" | "memorial" | "tourism" | "park"
        | "mall" | "university" | "hospital" => 18.0,
        "suburb" | "neighbourhood" | "quarter" | "district" | "locality" => 12.0,
        "city" | "town" | "village" | "county" | "state" => 8.0,
        "road" | "street" | "residential" | "primary" | "secondary" | "tertiary" | "highway"
        | "house" => 4.0,
        _ => 2.0,
    }
}

/// Heuristic relevance of `suggestion` for an already normalized query.
pub fn score(query: &str, suggestion: &LocationSuggestion) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let name = normalize_query(&suggestion.name);
    let address = normalize_query(&suggestion.address);

    let mut total = 0.0;
    if name == query {
        total += EXACT_NAME;
    } else if name.starts_with(query) {
        total += NAME_PREFIX;
    }
    if address.starts_with(query) {
        total += ADDRESS_PREFIX;
    } else if address.contains(query) || name.contains(query) {
        total += SUBSTRING;
    }

    let words: Vec<&str> = query.split(' ').collect();
    let matched = words
        .iter()
        .filter(|w| name.contains(*w) || address.contains(*w))
        .count();
    total += WORD_OVERLAP * matched as f64 / words.len() as f64;

    total += place_type_weight(suggestion.place_type.as_deref());
    total += IMPORTANCE * suggestion.importance.unwrap_or(0.0).clamp(0.0, 1.0);
    total
}

fn by_score_then_name(a: &LocationSuggestion, b: &LocationSuggestion) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.name.cmp(&b.name))
}

/// Deduplicate, score, sort and truncate.
pub fn rank(
    query: &str,
    candidates: Vec<LocationSuggestion>,
    limit: usize,
) -> Vec<LocationSuggestion> {
    let mut ranked: Vec<_> = dedupe(candidates)
        .into_iter()
        .map(|mut s| {
            s.score = score(query, &s);
            s
        })
        .collect();
    ranked.sort_by(by_score_then_name);
    ranked.truncate(limit);
    ranked
}
