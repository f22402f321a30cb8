// In-memory system of record.
//
// Used by the test suites and by the CLI (which loads and saves a JSON
// snapshot around it). Mirrors the spreadsheet's shape: row vectors for
// requests/items/logs, keyed rows for medications and users.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::activity::{ActivityLog, ActivityLogEntry, LogAction};
use crate::ledger::{Medication, StockLocation};
use crate::lifecycle::{Request, RequestItem, RequestStatus};
use crate::store::snapshot::StoreSnapshot;
use crate::store::{MedicationStore, RequestStore, StoreError, UserStore};
use crate::users::User;

#[derive(Debug, Default)]
struct Inner {
    medications: BTreeMap<String, Medication>,
    requests: Vec<Request>,
    items: Vec<RequestItem>,
    users: BTreeMap<String, User>,
    logs: Vec<ActivityLogEntry>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let inner = Inner {
            medications: snapshot
                .medications
                .into_iter()
                .map(|m| (m.id.clone(), m))
                .collect(),
            requests: snapshot.requests,
            items: snapshot.items,
            users: snapshot
                .users
                .into_iter()
                .map(|u| (u.email.clone(), u))
                .collect(),
            logs: snapshot.logs,
        };
        Self {
            inner: RwLock::new(inner),
        }
    }

    pub async fn to_snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.read().await;
        StoreSnapshot {
            medications: inner.medications.values().cloned().collect(),
            requests: inner.requests.clone(),
            items: inner.items.clone(),
            users: inner.users.values().cloned().collect(),
            logs: inner.logs.clone(),
        }
    }
}

#[async_trait]
impl MedicationStore for MemoryStore {
    async fn list_medications(&self) -> Result<Vec<Medication>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.medications.values().cloned().collect())
    }

    async fn get_medication(&self, id: &str) -> Result<Option<Medication>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.medications.get(id).cloned())
    }

    async fn insert_medication(&self, medication: Medication) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .medications
            .insert(medication.id.clone(), medication);
        Ok(())
    }

    async fn update_stock(
        &self,
        id: &str,
        location: StockLocation,
        value: u32,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.medications.get_mut(id) {
            Some(medication) => {
                medication.set_stock(location, value);
                Ok(())
            }
            None => Err(StoreError::unavailable(format!(
                "medication row missing for {id}"
            ))),
        }
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn list_requests(&self) -> Result<Vec<Request>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.requests.clone())
    }

    async fn get_request(&self, id: &str) -> Result<Option<Request>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn append_request(&self, request: Request) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.requests.push(request);
        Ok(())
    }

    async fn set_request_status(
        &self,
        id: &str,
        status: RequestStatus,
        staff_note: Option<&str>,
        processed_at: Option<DateTime<Utc>>,
        distribution_area: Option<StockLocation>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.requests.iter_mut().find(|r| r.id == id) {
            Some(request) => {
                request.status = status;
                if let Some(note) = staff_note {
                    request.staff_note = Some(note.to_string());
                }
                if let Some(at) = processed_at {
                    request.processed_at = Some(at);
                }
                if let Some(area) = distribution_area {
                    request.distribution_area = Some(area);
                }
                Ok(())
            }
            None => Err(StoreError::unavailable(format!(
                "request row missing for {id}"
            ))),
        }
    }

    async fn list_items(&self) -> Result<Vec<RequestItem>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.items.clone())
    }

    async fn items_for(&self, request_id: &str) -> Result<Vec<RequestItem>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .items
            .iter()
            .filter(|item| item.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn append_item(&self, item: RequestItem) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.items.push(item);
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(email).cloned())
    }

    async fn upsert_user(&self, user: User) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.users.insert(user.email.clone(), user);
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().cloned().collect())
    }
}

#[async_trait]
impl ActivityLog for MemoryStore {
    async fn record(
        &self,
        actor_email: &str,
        action: LogAction,
        details: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.logs.push(ActivityLogEntry {
            timestamp: Utc::now(),
            actor_email: actor_email.to_string(),
            action: action.as_str().to_string(),
            details: details.to_string(),
        });
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ActivityLogEntry>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.logs.iter().rev().take(limit).cloned().collect())
    }
}
