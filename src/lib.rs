// med-station - medication request and inventory tracking core
// This exposes the core components for testing and integration

pub mod activity;
pub mod config;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod notify;
pub mod reports;
pub mod store;
pub mod telemetry;
pub mod users;

// Re-export key types for easy access
pub use activity::{ActivityLog, ActivityLogEntry, LogAction};
pub use config::MedStationConfig;
pub use error::{DomainError, DomainResult};
pub use ledger::{Medication, NewMedication, StockLedger, StockLocation};
pub use lifecycle::{
    Actor, Decision, DispenseLine, LifecycleEngine, NewRequest, Request, RequestItem,
    RequestStatus, RequestView, Role, SubjectGroup,
};
pub use notify::{DomainEvent, NoopNotifier, Notifier};
pub use reports::{DispenseRow, MedicationTotal, ReportRange, ReportService};
pub use store::{
    KeyedLocks, MedicationStore, MemoryStore, RequestStore, StoreError, StoreSnapshot, UserStore,
};
pub use telemetry::{create_request_span, generate_correlation_id, init_telemetry};
pub use users::{User, UserDirectory};
