//! Cohort aggregation statistics.
//!
//! Pure recomputation over a set of completed score results: per-category
//! means and population standard deviations, distribution buckets,
//! dominant-style tallies, and a normalized-entropy diversity index. No
//! incremental state is carried, so recomputing after every completion is
//! always safe.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::error::EngineError;
use crate::model::{AggregateProfile, Bucket, CategoryStats, Distribution, InstrumentDefinition, ScoreResult};

/// Arithmetic mean. Returns 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (not the sample estimator).
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Normalized Shannon entropy of a count distribution, in [0, 1].
///
/// `H = -Σ p_i·ln(p_i) / ln(num_categories)`. Zero when everything falls in
/// one bucket or when fewer than 2 categories exist.
pub fn normalized_entropy(counts: &BTreeMap<String, usize>, num_categories: usize) -> f64 {
    let total: usize = counts.values().sum();
    if total == 0 || num_categories < 2 {
        return 0.0;
    }
    let entropy: f64 = counts
        .values()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.ln()
        })
        .sum();
    entropy / (num_categories as f64).ln()
}

/// Aggregate a cohort of completed results into a class-level profile.
///
/// Fails with `InsufficientData` for fewer than 2 results: a single-student
/// "average" would be misleading, so it is rejected rather than zeroed.
pub fn aggregate(
    results: &[ScoreResult],
    instrument: &InstrumentDefinition,
    total_students: usize,
) -> Result<AggregateProfile, EngineError> {
    if results.len() < 2 {
        return Err(EngineError::InsufficientData {
            count: results.len(),
        });
    }

    // Per-category score vectors
    let mut scores_by_category: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for result in results {
        for (category, &score) in &result.per_category {
            scores_by_category
                .entry(category.as_str())
                .or_default()
                .push(score);
        }
    }

    let mut per_category = BTreeMap::new();
    for (category, scores) in &scores_by_category {
        let mut distribution = Distribution::default();
        for &s in scores {
            distribution.tally(Bucket::for_score(s));
        }
        per_category.insert(
            (*category).to_string(),
            CategoryStats {
                mean: mean(scores),
                std_dev: population_std_dev(scores),
                distribution,
            },
        );
    }

    let mut dominant_style_counts: BTreeMap<String, usize> = BTreeMap::new();
    for result in results {
        *dominant_style_counts
            .entry(result.dominant_category.clone())
            .or_insert(0) += 1;
    }

    let most_common_style = most_common(&dominant_style_counts, instrument);
    let diversity_index =
        normalized_entropy(&dominant_style_counts, instrument.categories.len()) * 10.0;
    let flagged_results = results.iter().filter(|r| r.suspicious).count();

    Ok(AggregateProfile {
        instrument_type: instrument.id.clone(),
        instrument_version: instrument.version,
        total_students,
        total_completed_tests: results.len(),
        per_category,
        dominant_style_counts,
        most_common_style,
        diversity_index,
        flagged_results,
        computed_at: Utc::now(),
    })
}

/// Most frequent dominant style; ties keep the earlier declared category.
fn most_common(counts: &BTreeMap<String, usize>, instrument: &InstrumentDefinition) -> String {
    let mut best: Option<(&str, usize)> = None;
    for category in &instrument.categories {
        let Some(&count) = counts.get(category) else {
            continue;
        };
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((category, count));
        }
    }
    best.map(|(c, _)| c.to_string())
        .unwrap_or_else(|| instrument.categories.first().cloned().unwrap_or_default())
}
