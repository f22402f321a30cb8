// Request state transitions.
//
// The status stored in the backing store is the source of truth; this module
// holds the pure rules for what may follow what. Expiry is a derived,
// idempotent condition: PENDING past the window reads as EXPIRED whether or
// not the flip has been persisted yet.

use chrono::{DateTime, Duration, Utc};

use crate::error::{DomainError, DomainResult};
use crate::lifecycle::types::{Request, RequestStatus, Role};

/// Status as of `now`, before any write. PENDING flips to EXPIRED once the
/// request has sat unprocessed for longer than `window`; everything else is
/// already settled.
pub fn derive_status(request: &Request, now: DateTime<Utc>, window: Duration) -> RequestStatus {
    match request.status {
        RequestStatus::Pending if now - request.created_at > window => RequestStatus::Expired,
        status => status,
    }
}

/// Outcome of a permitted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub previous: RequestStatus,
    pub next: RequestStatus,
}

/// Check that a processing action (approve/reject) is legal from `current`
/// for an actor of `role`. Authorization relative to the requester is the
/// policy table's job; this is purely the status dimension.
pub fn processing_transition(
    current: RequestStatus,
    target: RequestStatus,
    role: Role,
) -> DomainResult<TransitionOutcome> {
    debug_assert!(target.is_processed());
    match current {
        RequestStatus::Pending => Ok(TransitionOutcome {
            previous: current,
            next: target,
        }),
        RequestStatus::Approved | RequestStatus::Rejected => {
            if role == Role::Admin {
                Ok(TransitionOutcome {
                    previous: current,
                    next: target,
                })
            } else {
                Err(DomainError::authorization(format!(
                    "request is already {current}; only an ADMIN can edit a processed request"
                )))
            }
        }
        RequestStatus::Expired => Err(DomainError::validation(
            "request has expired and can no longer be processed",
        )),
    }
}
