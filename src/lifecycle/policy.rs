// Authorization policy table.
//
// Every role gate in the system goes through this one mapping of
// (action, actor role, relation to the resource) -> allow/deny, so the rules
// are testable without any transport or store in the picture.

use crate::error::{DomainError, DomainResult};
use crate::lifecycle::types::{Actor, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    /// Submit a new request.
    SubmitRequest,
    /// See the staff processing queue (all requesters' pending items).
    ViewQueue,
    /// Approve or reject a PENDING request.
    ProcessPending,
    /// Re-run approval/rejection on an already processed request.
    Reprocess,
    /// Add medications, restock, transfer between locations.
    ManageInventory,
    /// Read the activity log.
    ViewLogs,
    /// Run dispensing reports.
    RunReports,
    /// Add users, change roles.
    ManageUsers,
}

/// How the actor relates to the resource being acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// The actor created the request in question.
    Requester,
    /// Anyone else, and actions with no per-resource relation.
    Other,
}

/// The table. Kept as a single exhaustive match so a missing rule is a
/// compile error, not a silent allow.
pub fn is_allowed(action: PolicyAction, role: Role, relation: Relation) -> bool {
    match (action, role, relation) {
        (PolicyAction::SubmitRequest, _, _) => true,

        (PolicyAction::ViewQueue, role, _) => role.is_clinical(),

        // No self-approval, whatever the role.
        (PolicyAction::ProcessPending, _, Relation::Requester) => false,
        (PolicyAction::ProcessPending, role, Relation::Other) => role.is_clinical(),

        // Retroactive edits are admin-only, and still never on one's own.
        (PolicyAction::Reprocess, _, Relation::Requester) => false,
        (PolicyAction::Reprocess, Role::Admin, Relation::Other) => true,
        (PolicyAction::Reprocess, _, Relation::Other) => false,

        (PolicyAction::ManageInventory, role, _) => role.is_clinical(),
        (PolicyAction::ViewLogs, role, _) => role.is_clinical(),
        (PolicyAction::RunReports, role, _) => role.is_clinical(),

        (PolicyAction::ManageUsers, Role::Admin, _) => true,
        (PolicyAction::ManageUsers, _, _) => false,
    }
}

/// Table lookup wrapped in the domain error with an actionable message.
pub fn authorize(action: PolicyAction, actor: &Actor, relation: Relation) -> DomainResult<()> {
    if is_allowed(action, actor.role, relation) {
        return Ok(());
    }
    let reason = match (action, relation) {
        (PolicyAction::ProcessPending, Relation::Requester)
        | (PolicyAction::Reprocess, Relation::Requester) => {
            format!("{} cannot process their own request", actor.email)
        }
        (PolicyAction::Reprocess, _) => format!(
            "editing a processed request requires ADMIN; {} is {}",
            actor.email, actor.role
        ),
        _ => format!(
            "{} ({}) is not allowed to perform this action",
            actor.email, actor.role
        ),
    };
    Err(DomainError::authorization(reason))
}
