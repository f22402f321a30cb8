use thiserror::Error;

use crate::ledger::StockLocation;
use crate::store::StoreError;

/// Errors surfaced by the lifecycle engine and the stock ledger.
///
/// Validation and authorization failures are detected before any mutation.
/// Store failures are surfaced as-is; retries belong to the storage
/// collaborator, not here.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("insufficient stock for {medication_id} at location {location}: need {requested}, have {available}")]
    InsufficientStock {
        medication_id: String,
        location: StockLocation,
        requested: u32,
        available: u32,
    },

    #[error("stock for {medication_id} at location {location} is at or below the minimum threshold ({available} <= {threshold}); restock before dispensing")]
    StockAtThreshold {
        medication_id: String,
        location: StockLocation,
        available: u32,
        threshold: u32,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("backing store failure: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        DomainError::Authorization(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        DomainError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// True when the error left the system untouched.
    pub fn is_precondition(&self) -> bool {
        !matches!(self, DomainError::Store(_))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
