use chrono::Utc;

use helpdesk_workflow::models::notification::{EventKind, NotificationStatus, NotificationType};
use helpdesk_workflow::models::state::{self, State, StateCatalog, SEED};
use helpdesk_workflow::models::state_change::{
    RequestStatus, StateChangeRequest, DEFAULT_DIRECT_REASON,
};
use helpdesk_workflow::models::user::Role;
use helpdesk_workflow::AppError;

fn seeded_catalog() -> StateCatalog {
    let rows = SEED
        .iter()
        .map(|&(id, code, name, is_active, is_final)| State {
            id,
            code: code.to_owned(),
            name: name.to_owned(),
            is_active,
            is_final,
        })
        .collect();
    StateCatalog::new(rows).expect("catalog")
}

// ── State catalog ────────────────────────────────────────

#[test]
fn seed_has_closed_as_only_final_state() {
    let finals: Vec<&str> = SEED
        .iter()
        .filter(|s| s.4)
        .map(|s| s.1)
        .collect();
    assert_eq!(finals, vec![state::CLOSED]);
}

#[test]
fn seed_marks_every_non_final_state_active() {
    assert!(SEED.iter().filter(|s| !s.4).all(|s| s.3));
}

#[test]
fn catalog_looks_up_by_code_and_id() {
    let catalog = seeded_catalog();
    let trial = catalog.require(state::TRIAL).expect("trial");
    assert_eq!(trial.id, 4);
    assert_eq!(catalog.by_id(4).map(|s| s.code.as_str()), Some(state::TRIAL));
    assert!(catalog.by_id(99).is_none());
}

#[test]
fn catalog_initial_is_lowest_ordinal() {
    let mut rows: Vec<State> = seeded_catalog().all().to_vec();
    rows.reverse();
    let catalog = StateCatalog::new(rows).expect("catalog");
    assert!(catalog.initial().is(state::OPEN));
    assert_eq!(catalog.all().first().map(|s| s.id), Some(1));
}

#[test]
fn unknown_code_is_state_not_found() {
    let catalog = seeded_catalog();
    let err = catalog.require("archived").expect_err("unknown code");
    assert!(matches!(err, AppError::StateNotFound(_)));
    assert!(matches!(catalog.require_id(42), Err(AppError::StateNotFound(_))));
}

#[test]
fn empty_catalog_is_rejected() {
    assert!(matches!(
        StateCatalog::new(Vec::new()),
        Err(AppError::StateNotFound(_))
    ));
}

// ── State change requests ────────────────────────────────

#[test]
fn pending_request_has_no_resolution() {
    let req = StateChangeRequest::pending("t1".into(), "u1".into(), 4, 6, "ready".into(), Utc::now());
    assert!(req.is_pending());
    assert!(req.approved_by.is_none());
    assert!(req.approved_at.is_none());
    assert!(req.rejection_reason.is_none());
}

#[test]
fn applied_request_is_stamped_by_approver() {
    let now = Utc::now();
    let req = StateChangeRequest::applied(
        "t1".into(),
        "tech".into(),
        "tech".into(),
        1,
        2,
        "checked power supply".into(),
        now,
    );
    assert_eq!(req.status, RequestStatus::Approved);
    assert_eq!(req.approved_by.as_deref(), Some("tech"));
    assert_eq!(req.approved_at, Some(now));
    assert_eq!(req.reason, "checked power supply");
}

#[test]
fn applied_request_defaults_empty_reason() {
    let req = StateChangeRequest::applied(
        "t1".into(),
        "tech".into(),
        "tech".into(),
        1,
        2,
        "   ".into(),
        Utc::now(),
    );
    assert_eq!(req.reason, DEFAULT_DIRECT_REASON);
}

#[test]
fn request_status_round_trips_storage_form() {
    for status in [RequestStatus::Pending, RequestStatus::Approved, RequestStatus::Rejected] {
        assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(RequestStatus::parse("cancelled"), None);
}

// ── Notifications ────────────────────────────────────────

#[test]
fn inferred_type_routes_to_first_recipient_role() {
    let kind = NotificationType::inferred(EventKind::ApprovalRequested, Role::Admin);
    assert_eq!(kind.code, "approval_requested");
    assert!(kind.send_to_admin);
    assert!(!kind.send_to_client);
    assert!(!kind.send_to_technician);
    assert!(kind.is_active);
}

#[test]
fn event_codes_are_distinct() {
    let codes = [
        EventKind::StateChanged.code(),
        EventKind::ApprovalRequested.code(),
        EventKind::TicketFinalized.code(),
        EventKind::ApprovalRejected.code(),
    ];
    let unique: std::collections::HashSet<_> = codes.iter().collect();
    assert_eq!(unique.len(), codes.len());
}

#[test]
fn notification_status_parse_rejects_unknown() {
    assert_eq!(NotificationStatus::parse("sent"), Some(NotificationStatus::Sent));
    assert_eq!(NotificationStatus::parse("bounced"), None);
}

#[test]
fn role_parse_matches_as_str() {
    for role in [Role::Client, Role::Technician, Role::Admin] {
        assert_eq!(Role::parse(role.as_str()), Some(role));
    }
    assert_eq!(Role::parse("supervisor"), None);
}
