// Shared fixtures for the integration suites: a fully wired station over the
// in-memory store, plus doubles for the notification and log seams.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::Mutex;

use med_station::activity::{ActivityLog, ActivityLogEntry, LogAction};
use med_station::notify::{DomainEvent, Notifier};
use med_station::store::StoreError;
use med_station::{
    Actor, KeyedLocks, LifecycleEngine, MemoryStore, NewMedication, Role, StockLedger,
};

/// Notifier double that records every event it is handed.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<DomainEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &DomainEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Activity log double whose appends always fail, for exercising the
/// "log is non-fatal" contract.
#[derive(Debug, Default)]
pub struct FailingLog;

#[async_trait]
impl ActivityLog for FailingLog {
    async fn record(
        &self,
        _actor_email: &str,
        _action: LogAction,
        _details: &str,
    ) -> Result<(), StoreError> {
        Err(StoreError::unavailable("log sheet unreachable"))
    }

    async fn recent(&self, _limit: usize) -> Result<Vec<ActivityLogEntry>, StoreError> {
        Ok(Vec::new())
    }
}

pub struct TestStation {
    pub store: Arc<MemoryStore>,
    pub engine: LifecycleEngine,
    pub ledger: Arc<StockLedger>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn station() -> TestStation {
    station_with_log(None)
}

/// Station wired with an optional replacement for the activity log seam.
pub fn station_with_log(log: Option<Arc<dyn ActivityLog>>) -> TestStation {
    let store = Arc::new(MemoryStore::new());
    let locks = Arc::new(KeyedLocks::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let log: Arc<dyn ActivityLog> = log.unwrap_or_else(|| store.clone());

    let ledger = Arc::new(StockLedger::new(
        store.clone(),
        locks.clone(),
        log.clone(),
        notifier.clone(),
    ));
    let engine = LifecycleEngine::new(
        store.clone(),
        store.clone(),
        ledger.clone(),
        log,
        notifier.clone(),
        locks,
    );
    TestStation {
        store,
        engine,
        ledger,
        notifier,
    }
}

pub fn staff() -> Actor {
    Actor::new("staff@pnt.edu.vn", Role::Staff)
}

pub fn admin() -> Actor {
    Actor::new("admin@pnt.edu.vn", Role::Admin)
}

pub fn alice() -> Actor {
    Actor::new("alice@pnt.edu.vn", Role::Employee)
}

pub async fn seed_medication(
    station: &TestStation,
    id: &str,
    stock_a: u32,
    stock_b: u32,
    threshold: u32,
) {
    station
        .ledger
        .add_medication(
            &admin(),
            NewMedication {
                id: id.to_string(),
                name: format!("{id} (test)"),
                unit: "pill".to_string(),
                stock_area_a: stock_a,
                stock_area_b: stock_b,
                min_threshold: threshold,
            },
        )
        .await
        .unwrap();
}

pub fn hours_ago(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    now - chrono::Duration::hours(hours)
}
