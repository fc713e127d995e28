use thiserror::Error;

pub type Result<T> = std::result::Result<T, FleetError>;

/// Failure taxonomy shared across the fleet crates.
///
/// `Network` covers unreachable or timed-out collaborators and is never
/// retried automatically. `Validation` failures are rejected before any
/// mutation happens. `Conflict` marks "already exists" conditions that most
/// call sites treat as idempotent success. `ConfigIntegrity` means a
/// mutated proxy configuration failed the daemon's own syntax check and was
/// rolled back.
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("No range available: {0}")]
    NoRangeAvailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Config integrity error: {0}")]
    ConfigIntegrity(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for FleetError {
    fn from(err: serde_json::Error) -> Self {
        FleetError::Serialization(err.to_string())
    }
}

impl FleetError {
    /// True for the "already exists" class of failures that callers treat
    /// as idempotent success rather than a hard error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, FleetError::Conflict(_))
    }
}
