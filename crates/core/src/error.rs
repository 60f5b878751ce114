use thiserror::Error;

/// Errors surfaced by the search core.
///
/// Configuration and space errors are reported at session init and abort the
/// search.  Rogue ids are recoverable (PRO drops them, ANGEL reports them).
/// Internal-state errors indicate a broken state machine and are fatal.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid search space: {0}")]
    Space(String),

    #[error("could not parse point: {0}")]
    PointParse(String),

    #[error("unknown trial id {0}")]
    RogueId(u64),

    #[error("internal state error: {0}")]
    Internal(String),
}

pub type Result<T, E = SearchError> = std::result::Result<T, E>;
