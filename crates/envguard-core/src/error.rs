//! Error types for envguard-core operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid resolution status: {0}")]
    InvalidResolution(String),

    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Unknown {kind} value: {value}")]
    UnknownStatus { kind: &'static str, value: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Refresh intent {0} has a MAJOR conflict flag and needs an explicit override")]
    ForceApprovalRequired(String),

    #[error("A destructive refresh overlaps this booking window; acknowledgement is required")]
    AcknowledgementRequired,

    #[error("Booking {0} is active and cannot be deleted")]
    BookingActive(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
