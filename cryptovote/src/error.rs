use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("cryptovote: invalid parameters: {0}")]
    ParameterError(String),

    #[error("cryptovote: value out of range: {0}")]
    DomainError(String),

    #[error("cryptovote: not enough partial decryptions: need {required}, found {supplied}")]
    ThresholdError { required: usize, supplied: usize },

    #[error("cryptovote: inconsistent partial decryptions: {0}")]
    ConsistencyError(String),

    #[error("cryptovote: mismatched sequence lengths: expected {expected}, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("cryptovote: ballot invariant violated: {0}")]
    InvariantViolation(String),

    #[error("cryptovote: authority {0} is unavailable")]
    AuthorityUnavailable(usize),

    #[error("cryptovote: timed out collecting partial decryptions: need {required}, collected {collected}")]
    QuorumTimeout { required: usize, collected: usize },

    #[error("cryptovote: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Liveness failures can be retried with a different set of authorities.
    /// Every other error is final for the operation that raised it.
    pub fn is_liveness_failure(&self) -> bool {
        matches!(
            self,
            Error::AuthorityUnavailable(_) | Error::QuorumTimeout { .. }
        )
    }
}
