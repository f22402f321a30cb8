//! Append-only audit trail of who changed what.
//!
//! The log is a non-authoritative side channel: every consumer records after
//! a mutation succeeds, and a failed append is logged and swallowed rather
//! than failing the operation that produced it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::store::StoreError;

/// Actions recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogAction {
    CreateRequest,
    ApproveRequest,
    RejectRequest,
    AddMedication,
    Restock,
    TransferStock,
    UpdateProfile,
    SetRole,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::CreateRequest => "CREATE_REQUEST",
            LogAction::ApproveRequest => "APPROVE_REQUEST",
            LogAction::RejectRequest => "REJECT_REQUEST",
            LogAction::AddMedication => "ADD_MEDICATION",
            LogAction::Restock => "RESTOCK",
            LogAction::TransferStock => "TRANSFER_STOCK",
            LogAction::UpdateProfile => "UPDATE_PROFILE",
            LogAction::SetRole => "SET_ROLE",
        }
    }
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub timestamp: DateTime<Utc>,
    pub actor_email: String,
    pub action: String,
    pub details: String,
}

/// Write contract of the activity log. Entries are never mutated; ordering
/// reflects call order, not wall-clock guarantees, under concurrent callers.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record(
        &self,
        actor_email: &str,
        action: LogAction,
        details: &str,
    ) -> Result<(), StoreError>;

    /// Entries newest-first, up to `limit`.
    async fn recent(&self, limit: usize) -> Result<Vec<ActivityLogEntry>, StoreError>;
}

/// Record an entry, treating failure as non-fatal.
pub(crate) async fn record_best_effort(
    log: &dyn ActivityLog,
    actor_email: &str,
    action: LogAction,
    details: &str,
) {
    if let Err(err) = log.record(actor_email, action, details).await {
        tracing::warn!(
            actor = %actor_email,
            action = %action,
            error = %err,
            "activity log append failed; continuing"
        );
    }
}
