// Core types for the request lifecycle engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ledger::StockLocation;

/// The single authorization axis. Any authenticated identity not present in
/// the user directory defaults to EMPLOYEE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Employee,
    Staff,
    Admin,
}

impl Role {
    /// STAFF and ADMIN review and dispense; EMPLOYEE only submits.
    pub fn is_clinical(&self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "EMPLOYEE",
            Role::Staff => "STAFF",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caller with an externally resolved identity. The core never
/// authenticates; it only authorizes against the resolved role.
#[derive(Debug, Clone)]
pub struct Actor {
    pub email: String,
    pub role: Role,
}

impl Actor {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            role,
        }
    }
}

/// Who the request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectGroup {
    Student,
    Employee,
}

impl SubjectGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectGroup::Student => "STUDENT",
            SubjectGroup::Employee => "EMPLOYEE",
        }
    }
}

impl fmt::Display for SubjectGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
            RequestStatus::Expired => "EXPIRED",
        }
    }

    /// Terminal for non-admin actors. EXPIRED is terminal for everyone.
    pub fn is_processed(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A medication request.
///
/// `staff_note`, `processed_at` and `distribution_area` stay unset until the
/// first processing action; `distribution_area` is set only on approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub requester_email: String,
    pub created_at: DateTime<Utc>,
    pub subject_group: SubjectGroup,
    pub note: String,
    pub status: RequestStatus,
    #[serde(default)]
    pub staff_note: Option<String>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub distribution_area: Option<StockLocation>,
}

/// A dispensed (or wish-list) line item. Append-only: rows are never mutated
/// or removed, so re-approving a request adds rows rather than replacing them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestItem {
    pub request_id: String,
    pub medication_id: String,
    pub quantity: u32,
}

/// One medication/quantity pair as submitted by a requester or staff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispenseLine {
    pub medication_id: String,
    pub quantity: u32,
}

impl DispenseLine {
    pub fn new(medication_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            medication_id: medication_id.into(),
            quantity,
        }
    }
}

/// Input for submitting a new request.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub subject_group: SubjectGroup,
    pub note: String,
    /// Wish-list selection recorded at creation. No stock effect.
    pub initial_items: Vec<DispenseLine>,
}

/// A line item joined with its medication name for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemView {
    pub medication_id: String,
    pub medication_name: String,
    pub quantity: u32,
}

/// A request joined with its line items, as returned from list reads.
#[derive(Debug, Clone)]
pub struct RequestView {
    pub request: Request,
    pub items: Vec<ItemView>,
}

/// Staff/admin processing action on a request.
#[derive(Debug, Clone)]
pub enum Decision {
    Approve {
        staff_note: String,
        distribution_area: StockLocation,
        items: Vec<DispenseLine>,
    },
    Reject {
        staff_note: String,
    },
}

impl Decision {
    pub fn staff_note(&self) -> &str {
        match self {
            Decision::Approve { staff_note, .. } => staff_note,
            Decision::Reject { staff_note } => staff_note,
        }
    }

    pub fn target_status(&self) -> RequestStatus {
        match self {
            Decision::Approve { .. } => RequestStatus::Approved,
            Decision::Reject { .. } => RequestStatus::Rejected,
        }
    }
}
