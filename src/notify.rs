//! Domain events for the external push/notification collaborator.
//!
//! The core only emits; delivery (web push, mail, whatever) lives outside.
//! Delivery failures must never affect core state, so every emission goes
//! through [`emit`], which logs and swallows errors.

use async_trait::async_trait;

use crate::ledger::StockLocation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    /// A new request landed in the staff queue.
    RequestCreated {
        request_id: String,
        requester_email: String,
    },
    RequestApproved {
        request_id: String,
        requester_email: String,
    },
    RequestRejected {
        request_id: String,
        requester_email: String,
    },
    /// A dispense left a location at or below its warning threshold.
    StockBelowThreshold {
        medication_id: String,
        location: StockLocation,
        remaining: u32,
        threshold: u32,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &DomainEvent) -> anyhow::Result<()>;
}

/// Notifier that drops everything. Default for the CLI and for tests that
/// don't care about events.
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _event: &DomainEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Emit an event, treating delivery failure as non-fatal.
pub(crate) async fn emit(notifier: &dyn Notifier, event: DomainEvent) {
    if let Err(err) = notifier.notify(&event).await {
        tracing::warn!(event = ?event, error = %err, "notification delivery failed; continuing");
    }
}
