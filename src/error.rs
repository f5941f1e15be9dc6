use thiserror::Error;

/// Failure of a single store call
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Request rejected before any group runs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("trialId is required")]
    MissingTrialId,
    #[error("no duplicate entries supplied")]
    NoDuplicates,
    #[error("record {index} has an empty entryId")]
    MissingEntryId { index: usize },
    #[error("invalid request body: {0}")]
    MalformedBody(String),
}
