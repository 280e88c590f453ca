/// Finite values in ascending order; `None` when nothing finite remains.
fn sorted_finite(values: &[f64]) -> Option<Vec<f64>> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_unstable_by(f64::total_cmp);
    Some(sorted)
}

/// Interpolates at fractional rank `q * (n - 1)` of an ascending, non-empty slice.
fn interpolate_sorted(sorted: &[f64], q: f64) -> f64 {
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

/// Median of the finite values. Even counts land halfway between the two
/// middle values.
pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Linearly interpolated quantile over the finite values, `q` in `[0, 1]`.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if !(0.0..=1.0).contains(&q) {
        return None;
    }
    sorted_finite(values).map(|sorted| interpolate_sorted(&sorted, q))
}

pub fn mean(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    Some(finite.iter().sum::<f64>() / finite.len() as f64)
}

/// `|value - center| / center`; `None` when the center cannot anchor a ratio.
pub fn relative_deviation(value: f64, center: f64) -> Option<f64> {
    if !center.is_finite() || center <= 0.0 || !value.is_finite() {
        return None;
    }
    Some((value - center).abs() / center)
}
