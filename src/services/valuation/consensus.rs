use serde::Serialize;

use super::params::ScoringConfiguration;
use super::types::ScoredComparable;
use crate::services::robust;

/// Which of the three neighbor-selection paths produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPath {
    /// Pool too small (or no usable median); lowest scores taken as-is.
    InsufficientPool,
    /// Consensus rejection ran and left at least one candidate.
    Filtered,
    /// Every candidate was rejected; fell back to the unfiltered pool.
    Collapsed,
}

#[derive(Debug, Clone)]
pub struct ConsensusSelection<'a> {
    pub neighbors: Vec<ScoredComparable<'a>>,
    pub outliers: Vec<ScoredComparable<'a>>,
    pub median: Option<f64>,
    pub path: SelectionPath,
}

/// Ascending score, ties broken by auction id so output never depends on input order.
pub fn sort_by_score(scored: &mut [ScoredComparable<'_>]) {
    scored.sort_by(|a, b| {
        a.score
            .total_cmp(&b.score)
            .then_with(|| a.record.auction_id.cmp(&b.record.auction_id))
    });
}

fn rejection_reason(candidate: &ScoredComparable<'_>, median: f64, limit: f64) -> Option<String> {
    match robust::relative_deviation(candidate.adjusted_price, median) {
        Some(deviation) if deviation <= limit => None,
        Some(deviation) => Some(format!(
            "adjusted price {:.0} is {:.0}% from consensus median {:.0} (limit {:.0}%)",
            candidate.adjusted_price,
            deviation * 100.0,
            median,
            limit * 100.0
        )),
        None => Some(format!(
            "adjusted price {} cannot be compared to consensus median {median:.0}",
            candidate.adjusted_price
        )),
    }
}

/// Picks the final neighbor set from scored cohort members.
///
/// The candidate pool is the `pool_multiplier * neighbor_count` best-scoring
/// members. When the pool is large enough, members whose adjusted price sits
/// further than `max_relative_deviation` from the pool median are moved to
/// `outliers`. Filtering preserves score order.
pub fn select_neighbors<'a>(
    mut scored: Vec<ScoredComparable<'a>>,
    config: &ScoringConfiguration,
) -> ConsensusSelection<'a> {
    let k = config.shared.neighbor_count;
    let limit = config.consensus.max_relative_deviation;

    sort_by_score(&mut scored);
    scored.truncate(config.neighbor_pool_size());
    let mut pool = scored;

    let median = if pool.len() >= config.consensus.min_pool_for_median {
        let prices: Vec<f64> = pool.iter().map(|c| c.adjusted_price).collect();
        robust::median(&prices).filter(|m| *m > 0.0)
    } else {
        None
    };

    let reasons: Vec<Option<String>> = match median {
        Some(m) => pool.iter().map(|c| rejection_reason(c, m, limit)).collect(),
        None => vec![None; pool.len()],
    };
    let any_survivor = reasons.iter().any(Option::is_none);

    match (median, any_survivor) {
        (None, _) => {
            pool.truncate(k);
            ConsensusSelection {
                neighbors: pool,
                outliers: Vec::new(),
                median: None,
                path: SelectionPath::InsufficientPool,
            }
        }
        (Some(median), true) => {
            let mut neighbors = Vec::with_capacity(k);
            let mut outliers = Vec::new();
            for (mut candidate, reason) in pool.into_iter().zip(reasons) {
                match reason {
                    Some(reason) => {
                        candidate.outlier_reason = Some(reason);
                        outliers.push(candidate);
                    }
                    None if neighbors.len() < k => neighbors.push(candidate),
                    None => {}
                }
            }
            ConsensusSelection {
                neighbors,
                outliers,
                median: Some(median),
                path: SelectionPath::Filtered,
            }
        }
        (Some(median), false) => {
            tracing::debug!(
                pool = pool.len(),
                median,
                "consensus rejected every candidate; using unfiltered pool"
            );
            pool.truncate(k);
            ConsensusSelection {
                neighbors: pool,
                outliers: Vec::new(),
                median: Some(median),
                path: SelectionPath::Collapsed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{record, scored};
    use crate::services::valuation::types::VehicleRecord;

    fn records(prices: &[f64]) -> Vec<VehicleRecord> {
        prices
            .iter()
            .enumerate()
            .map(|(idx, price)| {
                let mut rec = record(&format!("r{idx:02}"));
                rec.winning_bid = *price;
                rec
            })
            .collect()
    }

    fn ids(list: &[ScoredComparable<'_>]) -> Vec<String> {
        list.iter().map(|c| c.record.auction_id.clone()).collect()
    }

    #[test]
    fn ten_x_outlier_is_rejected_even_with_best_score() {
        let recs = records(&[300_000.0, 30_000.0, 30_500.0, 29_500.0, 31_000.0, 29_000.0]);
        let candidates: Vec<_> = recs
            .iter()
            .enumerate()
            .map(|(idx, rec)| scored(rec, idx as f64 * 10.0))
            .collect();
        let config = ScoringConfiguration::default();
        let selection = select_neighbors(candidates, &config);

        assert_eq!(selection.path, SelectionPath::Filtered);
        assert!(!ids(&selection.neighbors).contains(&"r00".to_string()));
        assert_eq!(ids(&selection.outliers), vec!["r00".to_string()]);
        assert!(selection.outliers[0].outlier_reason.is_some());
        assert_eq!(selection.neighbors.len(), 5);
    }

    #[test]
    fn small_pool_skips_rejection() {
        let recs = records(&[300_000.0, 30_000.0]);
        let candidates: Vec<_> = recs.iter().map(|rec| scored(rec, 1.0)).collect();
        let selection = select_neighbors(candidates, &ScoringConfiguration::default());
        assert_eq!(selection.path, SelectionPath::InsufficientPool);
        assert_eq!(selection.neighbors.len(), 2);
        assert!(selection.outliers.is_empty());
        assert_eq!(selection.median, None);
    }

    #[test]
    fn total_collapse_falls_back_to_unfiltered_top_k() {
        // Bimodal pool of four: the median (55k) is >25% from every member.
        let recs = records(&[10_000.0, 10_000.0, 100_000.0, 100_000.0]);
        let candidates: Vec<_> = recs
            .iter()
            .enumerate()
            .map(|(idx, rec)| scored(rec, idx as f64))
            .collect();
        let mut config = ScoringConfiguration::default();
        config.shared.neighbor_count = 3;
        let selection = select_neighbors(candidates, &config);
        assert_eq!(selection.path, SelectionPath::Collapsed);
        assert_eq!(ids(&selection.neighbors), vec!["r00", "r01", "r02"]);
        assert_eq!(selection.median, Some(55_000.0));
        assert!(selection.outliers.is_empty());
    }

    #[test]
    fn pool_is_limited_to_multiplier_times_k() {
        let prices = vec![30_000.0; 12];
        let recs = records(&prices);
        let candidates: Vec<_> = recs
            .iter()
            .enumerate()
            .map(|(idx, rec)| scored(rec, (12 - idx) as f64))
            .collect();
        let mut config = ScoringConfiguration::default();
        config.shared.neighbor_count = 2;
        let selection = select_neighbors(candidates, &config);
        // Lowest scores are the last records.
        assert_eq!(ids(&selection.neighbors), vec!["r11", "r10"]);
    }

    #[test]
    fn ties_are_broken_by_auction_id() {
        let recs = records(&[30_000.0, 30_000.0, 30_000.0]);
        let mut candidates: Vec<_> = recs.iter().map(|rec| scored(rec, 5.0)).collect();
        candidates.reverse();
        sort_by_score(&mut candidates);
        assert_eq!(ids(&candidates), vec!["r00", "r01", "r02"]);
    }
}
