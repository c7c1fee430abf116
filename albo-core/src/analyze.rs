use crate::model::MappingEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_GAP_LIMIT: i64 = 5;

/// Key-space relation between two consecutive discovered params.
///
/// Attachments uploaded together tend to receive adjacent key ids, so a
/// small gap between one param's last key and the next param's first key
/// marks a stretch where consecutive scanning beats prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequentialPattern {
    pub param_from: i64,
    pub param_to: i64,
    pub last_key_from: i64,
    pub first_key_to: i64,
    pub gap: i64,
    pub is_sequential: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternAnalysis {
    pub total_entries: usize,
    pub total_params: usize,
    pub param_min: Option<i64>,
    pub param_max: Option<i64>,
    pub param_span: i64,
    pub key_min: Option<i64>,
    pub key_max: Option<i64>,
    pub key_span: i64,
    pub patterns: Vec<SequentialPattern>,
    pub sequential_count: usize,
}

/// Classifies the key-space structure of the discovered corpus.
///
/// Params are examined in ascending order; each consecutive pair yields one
/// `SequentialPattern` with `gap = first_key(next) - last_key(prev)`.
pub fn analyze(entries: &[MappingEntry], gap_limit: i64) -> PatternAnalysis {
    let mut keys_by_param: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for entry in entries {
        keys_by_param.entry(entry.param).or_default().push(entry.key);
    }
    for keys in keys_by_param.values_mut() {
        keys.sort_unstable();
    }

    let param_min = keys_by_param.keys().next().copied();
    let param_max = keys_by_param.keys().next_back().copied();
    let key_min = entries.iter().map(|e| e.key).min();
    let key_max = entries.iter().map(|e| e.key).max();

    let mut patterns = Vec::new();
    let params: Vec<i64> = keys_by_param.keys().copied().collect();
    for pair in params.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        // Per-param vectors are sorted and never empty.
        let last_key_from = *keys_by_param[&from].last().unwrap_or(&0);
        let first_key_to = *keys_by_param[&to].first().unwrap_or(&0);
        let gap = first_key_to - last_key_from;
        patterns.push(SequentialPattern {
            param_from: from,
            param_to: to,
            last_key_from,
            first_key_to,
            gap,
            // Overlapping key ranges (negative gap) count as sequential too.
            is_sequential: gap <= gap_limit,
        });
    }

    let sequential_count = patterns.iter().filter(|p| p.is_sequential).count();

    PatternAnalysis {
        total_entries: entries.len(),
        total_params: keys_by_param.len(),
        param_min,
        param_max,
        param_span: span(param_min, param_max),
        key_min,
        key_max,
        key_span: span(key_min, key_max),
        patterns,
        sequential_count,
    }
}

/// Inclusive span: a corpus covering 50400..=50416 spans 17 ids.
fn span(min: Option<i64>, max: Option<i64>) -> i64 {
    match (min, max) {
        (Some(lo), Some(hi)) => hi - lo + 1,
        _ => 0,
    }
}
