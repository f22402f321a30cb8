// JSON snapshot of the whole store, used by the CLI to persist state between
// invocations. The file layout mirrors the sheet tabs of the original
// system of record.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::activity::ActivityLogEntry;
use crate::ledger::Medication;
use crate::lifecycle::{Request, RequestItem};
use crate::store::StoreError;
use crate::users::User;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub requests: Vec<Request>,
    #[serde(default)]
    pub items: Vec<RequestItem>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub logs: Vec<ActivityLogEntry>,
}

pub fn load_snapshot(path: &Path) -> Result<StoreSnapshot, StoreError> {
    if !path.exists() {
        return Ok(StoreSnapshot::default());
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn save_snapshot(path: &Path, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let raw = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, raw)?;
    Ok(())
}
