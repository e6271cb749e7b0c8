use thiserror::Error;

/// Fatal errors from a checking invocation. Per-case predicate failures are
/// never errors; they land in the case's verdict instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckError {
    #[error("unknown group: {0}")]
    UnknownGroup(String),
    #[error("verdict delivered twice for case {serial}")]
    DoubleVerdict { serial: u64 },
    #[error("verdict delivered for unknown case {serial}")]
    UnknownCase { serial: u64 },
}

/// Build-time specifier contract violations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("one_of requires a non-empty string or array of choices")]
    EmptyChoices,
    #[error("one_of weights length {weights} does not match choices length {choices}")]
    WeightMismatch { choices: usize, weights: usize },
    #[error("one_of weights must have a positive total")]
    NonPositiveWeights,
}
