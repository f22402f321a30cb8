//! Read-only dispensing aggregation for the export collaborator.
//!
//! Only APPROVED requests count. A request falls in a range by its
//! `processed_at`, with `created_at` as the fallback for rows processed
//! before that column existed. Rendering (Excel etc.) stays outside the
//! core; this module returns structured rows.

use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::DomainResult;
use crate::lifecycle::policy::{authorize, PolicyAction, Relation};
use crate::lifecycle::{Actor, ItemView, RequestStatus, SubjectGroup};
use crate::store::{MedicationStore, RequestStore};

/// Half-open range `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ReportRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// The calendar month `year`-`month`, or None for an invalid month.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let from = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()?;
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let to = Utc
            .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
            .single()?;
        Some(Self { from, to })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at < self.to
    }
}

/// Total dispensed per medication over a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicationTotal {
    pub medication_id: String,
    pub name: String,
    pub unit: String,
    pub total_dispensed: u32,
}

/// One approved request with its dispensed items, for the per-requester
/// report.
#[derive(Debug, Clone)]
pub struct DispenseRow {
    pub request_id: String,
    pub requester_email: String,
    pub subject_group: SubjectGroup,
    pub processed_at: Option<DateTime<Utc>>,
    pub staff_note: Option<String>,
    pub items: Vec<ItemView>,
}

pub struct ReportService {
    requests: Arc<dyn RequestStore>,
    medications: Arc<dyn MedicationStore>,
}

impl ReportService {
    pub fn new(requests: Arc<dyn RequestStore>, medications: Arc<dyn MedicationStore>) -> Self {
        Self {
            requests,
            medications,
        }
    }

    pub async fn dispensed_by_medication(
        &self,
        actor: &Actor,
        range: ReportRange,
    ) -> DomainResult<Vec<MedicationTotal>> {
        authorize(PolicyAction::RunReports, actor, Relation::Other)?;
        let rows = self.approved_in_range(range).await?;

        let mut totals: BTreeMap<String, u32> = BTreeMap::new();
        for row in &rows {
            for item in &row.items {
                *totals.entry(item.medication_id.clone()).or_default() += item.quantity;
            }
        }

        let medications = self.medications.list_medications().await?;
        let info: HashMap<&str, (&str, &str)> = medications
            .iter()
            .map(|m| (m.id.as_str(), (m.name.as_str(), m.unit.as_str())))
            .collect();

        Ok(totals
            .into_iter()
            .map(|(id, total)| {
                let (name, unit) = info.get(id.as_str()).copied().unwrap_or(("Unknown", "?"));
                MedicationTotal {
                    medication_id: id,
                    name: name.to_string(),
                    unit: unit.to_string(),
                    total_dispensed: total,
                }
            })
            .collect())
    }

    pub async fn dispensed_by_requester(
        &self,
        actor: &Actor,
        range: ReportRange,
    ) -> DomainResult<Vec<DispenseRow>> {
        authorize(PolicyAction::RunReports, actor, Relation::Other)?;
        let mut rows = self.approved_in_range(range).await?;
        rows.sort_by_key(|row| row.processed_at);
        Ok(rows)
    }

    async fn approved_in_range(&self, range: ReportRange) -> DomainResult<Vec<DispenseRow>> {
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

        let mut rows = Vec::new();
        for request in requests {
            if request.status != RequestStatus::Approved {
                continue;
            }
            let effective = request.processed_at.unwrap_or(request.created_at);
            if !range.contains(effective) {
                continue;
            }
            rows.push(DispenseRow {
                items: items_by_request
                    .remove(request.id.as_str())
                    .unwrap_or_default(),
                request_id: request.id,
                requester_email: request.requester_email,
                subject_group: request.subject_group,
                processed_at: request.processed_at,
                staff_note: request.staff_note,
            });
        }
        Ok(rows)
    }
}
