//! Reporting aggregation tests: only APPROVED requests count, ranged by
//! processed time with creation time as the fallback.

use chrono::{TimeZone, Utc};
use std::sync::Arc;

use med_station::{
    Actor, Decision, DispenseLine, DomainError, NewRequest, ReportRange, ReportService, Role,
    StockLocation, SubjectGroup,
};

mod common;
use common::{seed_medication, staff, station, TestStation};

fn february() -> ReportRange {
    ReportRange::month(2026, 2).unwrap()
}

async fn approved_request(
    s: &TestStation,
    requester: &str,
    processed_at: chrono::DateTime<Utc>,
    items: Vec<DispenseLine>,
) -> String {
    let request = s
        .engine
        .submit(
            &Actor::new(requester, Role::Employee),
            NewRequest {
                subject_group: SubjectGroup::Employee,
                note: "symptoms".to_string(),
                initial_items: Vec::new(),
            },
            processed_at - chrono::Duration::hours(1),
        )
        .await
        .unwrap();
    s.engine
        .process(
            &staff(),
            &request.id,
            Decision::Approve {
                staff_note: "dispensed".to_string(),
                distribution_area: StockLocation::AreaA,
                items,
            },
            processed_at,
        )
        .await
        .unwrap();
    request.id
}

fn reports(s: &TestStation) -> ReportService {
    ReportService::new(s.store.clone(), s.store.clone())
}

#[tokio::test]
async fn totals_group_by_medication_within_the_month() {
    let s = station();
    seed_medication(&s, "PARA500", 100, 0, 0).await;
    seed_medication(&s, "ORS", 100, 0, 0).await;

    let in_feb = Utc.with_ymd_and_hms(2026, 2, 10, 9, 0, 0).unwrap();
    let in_march = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

    approved_request(
        &s,
        "alice@pnt.edu.vn",
        in_feb,
        vec![DispenseLine::new("PARA500", 4), DispenseLine::new("ORS", 2)],
    )
    .await;
    approved_request(
        &s,
        "bob@pnt.edu.vn",
        in_feb,
        vec![DispenseLine::new("PARA500", 1)],
    )
    .await;
    // Outside the range: must not count.
    approved_request(
        &s,
        "carol@pnt.edu.vn",
        in_march,
        vec![DispenseLine::new("PARA500", 50)],
    )
    .await;

    let totals = reports(&s)
        .dispensed_by_medication(&staff(), february())
        .await
        .unwrap();
    assert_eq!(totals.len(), 2);
    let para = totals
        .iter()
        .find(|t| t.medication_id == "PARA500")
        .unwrap();
    assert_eq!(para.total_dispensed, 5);
    assert_eq!(para.unit, "pill");
    let ors = totals.iter().find(|t| t.medication_id == "ORS").unwrap();
    assert_eq!(ors.total_dispensed, 2);
}

#[tokio::test]
async fn rejected_and_pending_requests_do_not_count() {
    let s = station();
    seed_medication(&s, "PARA500", 100, 0, 0).await;
    let in_feb = Utc.with_ymd_and_hms(2026, 2, 5, 10, 0, 0).unwrap();

    // Pending request with wish items.
    s.engine
        .submit(
            &Actor::new("alice@pnt.edu.vn", Role::Employee),
            NewRequest {
                subject_group: SubjectGroup::Student,
                note: "cold".to_string(),
                initial_items: vec![DispenseLine::new("PARA500", 9)],
            },
            in_feb,
        )
        .await
        .unwrap();

    // Rejected request.
    let rejected = s
        .engine
        .submit(
            &Actor::new("bob@pnt.edu.vn", Role::Employee),
            NewRequest {
                subject_group: SubjectGroup::Student,
                note: "cold".to_string(),
                initial_items: Vec::new(),
            },
            in_feb,
        )
        .await
        .unwrap();
    s.engine
        .process(
            &staff(),
            &rejected.id,
            Decision::Reject {
                staff_note: "no indication".to_string(),
            },
            in_feb,
        )
        .await
        .unwrap();

    let totals = reports(&s)
        .dispensed_by_medication(&staff(), february())
        .await
        .unwrap();
    assert!(totals.is_empty());
}

#[tokio::test]
async fn requester_report_lists_rows_in_processing_order() {
    let s = station();
    seed_medication(&s, "PARA500", 100, 0, 0).await;

    let later = Utc.with_ymd_and_hms(2026, 2, 20, 14, 0, 0).unwrap();
    let earlier = Utc.with_ymd_and_hms(2026, 2, 3, 8, 30, 0).unwrap();

    let late_id = approved_request(
        &s,
        "bob@pnt.edu.vn",
        later,
        vec![DispenseLine::new("PARA500", 1)],
    )
    .await;
    let early_id = approved_request(
        &s,
        "alice@pnt.edu.vn",
        earlier,
        vec![DispenseLine::new("PARA500", 2)],
    )
    .await;

    let rows = reports(&s)
        .dispensed_by_requester(&staff(), february())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].request_id, early_id);
    assert_eq!(rows[0].requester_email, "alice@pnt.edu.vn");
    assert_eq!(rows[1].request_id, late_id);
    assert_eq!(rows[0].items[0].medication_name, "PARA500 (test)");
    assert_eq!(rows[0].staff_note.as_deref(), Some("dispensed"));
}

#[tokio::test]
async fn reports_are_staff_gated() {
    let s = station();
    let err = reports(&s)
        .dispensed_by_medication(
            &Actor::new("eve@pnt.edu.vn", Role::Employee),
            february(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Authorization(_)));
}

#[tokio::test]
async fn missing_processed_at_falls_back_to_creation_time() {
    use med_station::store::RequestStore;
    use med_station::{Request, RequestItem, RequestStatus};

    let s = station();
    seed_medication(&s, "PARA500", 100, 0, 0).await;

    // A legacy row: approved before the processed-at column existed.
    let created = Utc.with_ymd_and_hms(2026, 2, 12, 7, 0, 0).unwrap();
    let store: Arc<_> = s.store.clone();
    store
        .append_request(Request {
            id: "REQ-legacy".to_string(),
            requester_email: "old@pnt.edu.vn".to_string(),
            created_at: created,
            subject_group: SubjectGroup::Employee,
            note: "legacy".to_string(),
            status: RequestStatus::Approved,
            staff_note: None,
            processed_at: None,
            distribution_area: Some(StockLocation::AreaA),
        })
        .await
        .unwrap();
    store
        .append_item(RequestItem {
            request_id: "REQ-legacy".to_string(),
            medication_id: "PARA500".to_string(),
            quantity: 3,
        })
        .await
        .unwrap();

    let totals = reports(&s)
        .dispensed_by_medication(&staff(), february())
        .await
        .unwrap();
    assert_eq!(totals.len(), 1);
    assert_eq!(totals[0].total_dispensed, 3);
}
