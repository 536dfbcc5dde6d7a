//! Top-K candidate selection and base-configuration update.

use tracing::info;

use ct_types::{CandidateKey, CtResult, ParameterConfig};

use crate::metrics::AggregateRow;

/// Rank rows by `(median accuracy + mean accuracy) / 2`, descending, and
/// return the top `k` candidates. The sort is stable, so tied rows keep
/// their submission order.
pub fn select_best(rows: &[AggregateRow], k: usize) -> Vec<CandidateKey> {
    let mut ranked: Vec<&AggregateRow> = rows.iter().collect();
    ranked.sort_by(|a, b| {
        b.score()
            .partial_cmp(&a.score())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
        .into_iter()
        .take(k)
        .map(|row| row.key.clone())
        .collect()
}

/// Fold the selected candidates into the *previous* iteration's base
/// configuration (never a candidate's derived config), producing the next
/// iteration's base.
pub fn apply_selection(
    base: &ParameterConfig,
    selected: &[CandidateKey],
) -> CtResult<ParameterConfig> {
    let mut next = base.clone();
    for key in selected {
        next.set(&key.name, key.value)?;
        info!(parameter = %key.name, value = %key.value, "selected candidate folded into configuration");
    }
    Ok(next)
}
