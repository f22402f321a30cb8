// Store seams - the spreadsheet (or any other) system of record sits behind
// these traits so the engine and ledger can be exercised against doubles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ledger::{Medication, StockLocation};
use crate::lifecycle::{Request, RequestItem, RequestStatus};
use crate::store::StoreError;
use crate::users::User;

/// Medication rows: one per medication, two stock counters each.
#[async_trait]
pub trait MedicationStore: Send + Sync {
    async fn list_medications(&self) -> Result<Vec<Medication>, StoreError>;

    async fn get_medication(&self, id: &str) -> Result<Option<Medication>, StoreError>;

    async fn insert_medication(&self, medication: Medication) -> Result<(), StoreError>;

    /// Overwrite one stock counter. The ledger is the only caller; all
    /// invariant checks happen there.
    async fn update_stock(
        &self,
        id: &str,
        location: StockLocation,
        value: u32,
    ) -> Result<(), StoreError>;
}

/// Request rows plus their append-only line items.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn list_requests(&self) -> Result<Vec<Request>, StoreError>;

    async fn get_request(&self, id: &str) -> Result<Option<Request>, StoreError>;

    async fn append_request(&self, request: Request) -> Result<(), StoreError>;

    /// Persist a status change. `None` fields are left untouched, which is
    /// how expiry flips status without inventing processing metadata.
    async fn set_request_status(
        &self,
        id: &str,
        status: RequestStatus,
        staff_note: Option<&str>,
        processed_at: Option<DateTime<Utc>>,
        distribution_area: Option<StockLocation>,
    ) -> Result<(), StoreError>;

    async fn list_items(&self) -> Result<Vec<RequestItem>, StoreError>;

    async fn items_for(&self, request_id: &str) -> Result<Vec<RequestItem>, StoreError>;

    /// Append-only: items are never mutated or deleted.
    async fn append_item(&self, item: RequestItem) -> Result<(), StoreError>;
}

/// The user directory sheet.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn upsert_user(&self, user: User) -> Result<(), StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
}
