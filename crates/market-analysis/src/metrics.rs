//! Concentration metrics.
//!
//! Pure functions over a numeric slice, applied per block and end-of-run to
//! stake or reward snapshots. Degenerate inputs (empty slice, zero sum) map
//! to 0 rather than an error: a distribution with no wealth has no measurable
//! concentration.

/// Gini coefficient in [0, 1]. 0 is perfect equality, values near 1 mean a
/// single participant holds nearly everything.
pub fn gini(values: &[f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, value)| (2.0 * (i as f64 + 1.0) - n as f64 - 1.0) * value)
        .sum();

    weighted / (n as f64 * total)
}

/// Herfindahl–Hirschman index: the sum of squared shares, in (0, 1].
/// 1/n for a perfectly even split of n participants, 1.0 for a monopoly.
pub fn hhi(values: &[f64]) -> f64 {
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    values
        .iter()
        .map(|value| {
            let share = value / total;
            share * share
        })
        .sum()
}

/// Share of the total held by the `k` largest entries.
pub fn top_k_share(values: &[f64], k: usize) -> f64 {
    let total: f64 = values.iter().sum();
    if total <= 0.0 || k == 0 {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let top: f64 = sorted.iter().take(k).sum();
    top / total
}

/// Convenience conversion for Gwei-valued snapshots.
pub fn to_f64(values: &[u64]) -> Vec<f64> {
    values.iter().map(|&v| v as f64).collect()
}
