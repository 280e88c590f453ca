use thiserror::Error;

/// Boundary failures for the valuation engine.
///
/// "No comparables" is not an error: an empty cohort or an empty neighbor set
/// comes back as a zero-price `Valuation`.
#[derive(Debug, Error)]
pub enum ValuationError {
    #[error("unknown powertrain: {0}")]
    UnknownPowertrain(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid scoring configuration: {0}")]
    InvalidConfig(String),

    #[error("dataset error: {0}")]
    Dataset(String),
}

impl ValuationError {
    pub fn unknown_powertrain(message: impl Into<String>) -> Self {
        Self::UnknownPowertrain(message.into())
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn dataset(message: impl Into<String>) -> Self {
        Self::Dataset(message.into())
    }
}

pub type ValuationResult<T> = Result<T, ValuationError>;
