pub mod errors;
pub mod locks;
pub mod memory;
pub mod snapshot;
pub mod traits;

pub use errors::StoreError;
pub use locks::KeyedLocks;
pub use memory::MemoryStore;
pub use snapshot::{load_snapshot, save_snapshot, StoreSnapshot};
pub use traits::{MedicationStore, RequestStore, UserStore};
