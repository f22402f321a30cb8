// The request lifecycle engine.
//
// Owns every transition of a medication request and the side effects that go
// with it: stock deductions through the ledger, activity log entries, and
// domain events. All mutating paths run under the per-request lock; the
// backing store itself offers no transactions, so side effects within one
// action are best-effort sequential and never rolled back.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::activity::{record_best_effort, ActivityLog, LogAction};
use crate::error::{DomainError, DomainResult};
use crate::ledger::StockLedger;
use crate::lifecycle::policy::{authorize, PolicyAction, Relation};
use crate::lifecycle::state::{derive_status, processing_transition};
use crate::lifecycle::types::{
    Actor, Decision, DispenseLine, ItemView, NewRequest, Request, RequestItem, RequestStatus,
    RequestView,
};
use crate::notify::{emit, DomainEvent, Notifier};
use crate::store::{KeyedLocks, MedicationStore, RequestStore};
use crate::users::is_valid_email;

pub const DEFAULT_EXPIRY_HOURS: i64 = 24;

pub struct LifecycleEngine {
    requests: Arc<dyn RequestStore>,
    medications: Arc<dyn MedicationStore>,
    ledger: Arc<StockLedger>,
    log: Arc<dyn ActivityLog>,
    notifier: Arc<dyn Notifier>,
    locks: Arc<KeyedLocks>,
    expiry_window: Duration,
}

impl LifecycleEngine {
    pub fn new(
        requests: Arc<dyn RequestStore>,
        medications: Arc<dyn MedicationStore>,
        ledger: Arc<StockLedger>,
        log: Arc<dyn ActivityLog>,
        notifier: Arc<dyn Notifier>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            requests,
            medications,
            ledger,
            log,
            notifier,
            locks,
            expiry_window: Duration::hours(DEFAULT_EXPIRY_HOURS),
        }
    }

    pub fn with_expiry_window(mut self, window: Duration) -> Self {
        self.expiry_window = window;
        self
    }

    /// Submit a new request on behalf of `actor`. Requires a subject group
    /// and at least one of a reason note or an initial medication selection.
    /// Initial selections are recorded as wish-list items with no stock
    /// effect.
    pub async fn submit(
        &self,
        actor: &Actor,
        new: NewRequest,
        now: DateTime<Utc>,
    ) -> DomainResult<Request> {
        authorize(PolicyAction::SubmitRequest, actor, Relation::Other)?;
        if !is_valid_email(&actor.email) {
            return Err(DomainError::validation(format!(
                "invalid requester email: {}",
                actor.email
            )));
        }
        let note = new.note.trim().to_string();
        if note.is_empty() && new.initial_items.is_empty() {
            return Err(DomainError::validation(
                "state a reason or select at least one medication",
            ));
        }
        self.check_lines(&new.initial_items).await?;

        let request = Request {
            id: generate_request_id(now),
            requester_email: actor.email.clone(),
            created_at: now,
            subject_group: new.subject_group,
            note,
            status: RequestStatus::Pending,
            staff_note: None,
            processed_at: None,
            distribution_area: None,
        };
        self.requests.append_request(request.clone()).await?;
        for line in &new.initial_items {
            self.requests
                .append_item(RequestItem {
                    request_id: request.id.clone(),
                    medication_id: line.medication_id.clone(),
                    quantity: line.quantity,
                })
                .await?;
        }

        tracing::info!(
            request = %request.id,
            requester = %request.requester_email,
            subject_group = %request.subject_group,
            items = new.initial_items.len(),
            "request submitted"
        );
        record_best_effort(
            self.log.as_ref(),
            &actor.email,
            LogAction::CreateRequest,
            &format!(
                "{} submitted for {}",
                request.id, request.subject_group
            ),
        )
        .await;
        emit(
            self.notifier.as_ref(),
            DomainEvent::RequestCreated {
                request_id: request.id.clone(),
                requester_email: request.requester_email.clone(),
            },
        )
        .await;
        Ok(request)
    }

    /// Requests visible to `viewer`, joined with their items, newest first.
    ///
    /// Expiry is applied lazily here: any PENDING request past the window is
    /// returned as EXPIRED and the flip is persisted best-effort (the target
    /// value is identical for every concurrent reader, so last-write-wins is
    /// fine). STAFF/ADMIN queues never contain EXPIRED requests; requesters
    /// always see their own, expired included.
    pub async fn list_for(
        &self,
        viewer: &Actor,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<RequestView>> {
        let requests = self.requests.list_requests().await?;
        let items = self.requests.list_items().await?;
        let medications = self.medications.list_medications().await?;

        let names: HashMap<&str, &str> = medications
            .iter()
            .map(|m| (m.id.as_str(), m.name.as_str()))
            .collect();
        let mut items_by_request: HashMap<&str, Vec<ItemView>> = HashMap::new();
        for item in &items {
            items_by_request
                .entry(item.request_id.as_str())
                .or_default()
                .push(ItemView {
                    medication_id: item.medication_id.clone(),
                    medication_name: names
                        .get(item.medication_id.as_str())
                        .unwrap_or(&"Unknown")
                        .to_string(),
                    quantity: item.quantity,
                });
        }

        let see_all = viewer.role.is_clinical();
        let mut views = Vec::new();
        for mut request in requests {
            let derived = derive_status(&request, now, self.expiry_window);
            if derived != request.status {
                // First reader to observe the condition persists it.
                if let Err(err) = self
                    .requests
                    .set_request_status(&request.id, derived, None, None, None)
                    .await
                {
                    tracing::debug!(request = %request.id, error = %err, "lazy expiry write failed");
                }
                request.status = derived;
            }

            let own = request.requester_email == viewer.email;
            let visible = if own {
                true
            } else {
                see_all && request.status != RequestStatus::Expired
            };
            if visible {
                let items = items_by_request.remove(request.id.as_str()).unwrap_or_default();
                views.push(RequestView { request, items });
            }
        }
        views.sort_by(|a, b| {
            b.request
                .created_at
                .cmp(&a.request.created_at)
                .then_with(|| b.request.id.cmp(&a.request.id))
        });
        Ok(views)
    }

    /// Approve or reject a request.
    ///
    /// Authorization: STAFF/ADMIN for pending requests, ADMIN for already
    /// processed ones, never the requester themselves. Approval with items
    /// dispenses each line from the chosen area; re-processing is additive
    /// (earlier item rows and deductions are never reversed). A mid-batch
    /// dispense failure aborts the remaining lines but leaves earlier ones
    /// applied.
    pub async fn process(
        &self,
        actor: &Actor,
        request_id: &str,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> DomainResult<Request> {
        let staff_note = decision.staff_note().trim().to_string();
        if staff_note.is_empty() {
            return Err(DomainError::validation(
                "a staff note is required to process a request",
            ));
        }
        if let Decision::Approve { items, .. } = &decision {
            for line in items {
                if line.quantity == 0 {
                    return Err(DomainError::validation(format!(
                        "quantity for {} must be at least 1",
                        line.medication_id
                    )));
                }
            }
        }

        let _guard = self.locks.acquire(request_id).await;
        let request = self
            .requests
            .get_request(request_id)
            .await?
            .ok_or_else(|| DomainError::not_found("request", request_id))?;

        // Re-derive under the lock: a request that expired while sitting in
        // a stale staff queue is expired, full stop.
        let current = derive_status(&request, now, self.expiry_window);
        if current == RequestStatus::Expired {
            if request.status != RequestStatus::Expired {
                self.requests
                    .set_request_status(request_id, RequestStatus::Expired, None, None, None)
                    .await?;
            }
            return Err(DomainError::validation(
                "request has expired and can no longer be processed",
            ));
        }

        let relation = if request.requester_email == actor.email {
            Relation::Requester
        } else {
            Relation::Other
        };
        let action = if current == RequestStatus::Pending {
            PolicyAction::ProcessPending
        } else {
            PolicyAction::Reprocess
        };
        authorize(action, actor, relation)?;
        let outcome = processing_transition(current, decision.target_status(), actor.role)?;

        match &decision {
            Decision::Approve {
                distribution_area,
                items,
                ..
            } => {
                self.requests
                    .set_request_status(
                        request_id,
                        RequestStatus::Approved,
                        Some(&staff_note),
                        Some(now),
                        Some(*distribution_area),
                    )
                    .await?;

                for line in items {
                    self.ledger
                        .dispense(&line.medication_id, line.quantity, *distribution_area)
                        .await?;
                    self.requests
                        .append_item(RequestItem {
                            request_id: request_id.to_string(),
                            medication_id: line.medication_id.clone(),
                            quantity: line.quantity,
                        })
                        .await?;
                }

                tracing::info!(
                    request = %request_id,
                    actor = %actor.email,
                    previous = %outcome.previous,
                    area = %distribution_area,
                    items = items.len(),
                    "request approved"
                );
                record_best_effort(
                    self.log.as_ref(),
                    &actor.email,
                    LogAction::ApproveRequest,
                    &format!(
                        "{} approved for {} ({})",
                        request_id,
                        request.requester_email,
                        describe_lines(items, *distribution_area)
                    ),
                )
                .await;
                emit(
                    self.notifier.as_ref(),
                    DomainEvent::RequestApproved {
                        request_id: request_id.to_string(),
                        requester_email: request.requester_email.clone(),
                    },
                )
                .await;
            }
            Decision::Reject { .. } => {
                self.requests
                    .set_request_status(
                        request_id,
                        RequestStatus::Rejected,
                        Some(&staff_note),
                        Some(now),
                        None,
                    )
                    .await?;

                tracing::info!(
                    request = %request_id,
                    actor = %actor.email,
                    previous = %outcome.previous,
                    "request rejected"
                );
                record_best_effort(
                    self.log.as_ref(),
                    &actor.email,
                    LogAction::RejectRequest,
                    &format!("{} rejected for {}", request_id, request.requester_email),
                )
                .await;
                emit(
                    self.notifier.as_ref(),
                    DomainEvent::RequestRejected {
                        request_id: request_id.to_string(),
                        requester_email: request.requester_email.clone(),
                    },
                )
                .await;
            }
        }

        self.requests
            .get_request(request_id)
            .await?
            .ok_or_else(|| DomainError::not_found("request", request_id))
    }

    /// Idempotent reconciliation sweep: persist the EXPIRED flip for every
    /// PENDING request past the window. Individual failures are logged and
    /// skipped so one bad row cannot wedge the sweep. Returns the number of
    /// requests flipped.
    pub async fn expire_pending(&self, now: DateTime<Utc>) -> DomainResult<usize> {
        let requests = self.requests.list_requests().await?;
        let mut flipped = 0;
        for request in requests {
            if request.status != RequestStatus::Pending {
                continue;
            }
            if derive_status(&request, now, self.expiry_window) != RequestStatus::Expired {
                continue;
            }
            let _guard = self.locks.acquire(&request.id).await;
            // Re-read under the lock; a processing action may have won.
            let fresh = match self.requests.get_request(&request.id).await {
                Ok(Some(fresh)) => fresh,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(request = %request.id, error = %err, "expiry sweep read failed");
                    continue;
                }
            };
            if fresh.status != RequestStatus::Pending {
                continue;
            }
            match self
                .requests
                .set_request_status(&request.id, RequestStatus::Expired, None, None, None)
                .await
            {
                Ok(()) => {
                    tracing::info!(request = %request.id, "request expired");
                    flipped += 1;
                }
                Err(err) => {
                    tracing::warn!(request = %request.id, error = %err, "expiry sweep write failed");
                }
            }
        }
        Ok(flipped)
    }

    async fn check_lines(&self, lines: &[DispenseLine]) -> DomainResult<()> {
        for line in lines {
            if line.quantity == 0 {
                return Err(DomainError::validation(format!(
                    "quantity for {} must be at least 1",
                    line.medication_id
                )));
            }
            if self
                .medications
                .get_medication(&line.medication_id)
                .await?
                .is_none()
            {
                return Err(DomainError::not_found("medication", &line.medication_id));
            }
        }
        Ok(())
    }
}

/// Time-derived request id, unique under same-millisecond creation.
fn generate_request_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("REQ-{}-{}", now.timestamp_millis(), &suffix[..4])
}

fn describe_lines(lines: &[DispenseLine], area: crate::ledger::StockLocation) -> String {
    if lines.is_empty() {
        return "no items dispensed".to_string();
    }
    let parts: Vec<String> = lines
        .iter()
        .map(|l| format!("{} x {}", l.quantity, l.medication_id))
        .collect();
    format!("{} from {}", parts.join(", "), area)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_time_prefixed_and_unique() {
        let now = Utc::now();
        let a = generate_request_id(now);
        let b = generate_request_id(now);
        assert!(a.starts_with(&format!("REQ-{}-", now.timestamp_millis())));
        assert_ne!(a, b);
    }

    #[test]
    fn line_description_reads_naturally() {
        let lines = vec![
            DispenseLine::new("PARA500", 2),
            DispenseLine::new("ORS", 1),
        ];
        assert_eq!(
            describe_lines(&lines, crate::ledger::StockLocation::AreaA),
            "2 x PARA500, 1 x ORS from A"
        );
    }
}
