//! Leave-one-out backtesting and randomized parameter search.

pub mod loo;
pub mod search;

pub use loo::{evaluate, EvaluationSummary, ERROR_CAP_PCT};
pub use search::{random_search, Range, SearchOptions, SearchOutcome, SearchSpace};
