pub mod engine;
pub mod policy;
pub mod state;
pub mod types;

pub use engine::{LifecycleEngine, DEFAULT_EXPIRY_HOURS};
pub use state::{derive_status, processing_transition, TransitionOutcome};
pub use types::{
    Actor, Decision, DispenseLine, ItemView, NewRequest, Request, RequestItem, RequestStatus,
    RequestView, Role, SubjectGroup,
};
