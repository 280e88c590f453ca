use super::types::ScoredComparable;

/// Inverse-distance weight. The `+ 1` keeps a zero-distance match finite.
pub fn neighbor_weight(score: f64, exponent: f64) -> f64 {
    (score + 1.0).powf(-exponent)
}

/// Weighted mean of adjusted prices. Fills in `weight` and `influence` on
/// every neighbor.
///
/// Returns `None` for an empty set and for a degenerate total weight
/// (zero or non-finite); callers turn that into a zero-price result.
pub fn weighted_estimate(neighbors: &mut [ScoredComparable<'_>], exponent: f64) -> Option<f64> {
    if neighbors.is_empty() {
        return None;
    }
    let weights: Vec<f64> = neighbors
        .iter()
        .map(|n| neighbor_weight(n.score, exponent))
        .collect();
    let total: f64 = weights.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return None;
    }

    let mut weighted_sum = 0.0;
    for (neighbor, weight) in neighbors.iter_mut().zip(weights) {
        weighted_sum += neighbor.adjusted_price * weight;
        neighbor.weight = Some(weight);
        neighbor.influence = Some(weight / total);
    }
    let price = weighted_sum / total;
    price.is_finite().then_some(price)
}
