//! Technician transitions end to end: rules, audit records, notifications.

use std::sync::Arc;

use helpdesk_workflow::models::notification::EventKind;
use helpdesk_workflow::models::state;
use helpdesk_workflow::models::state_change::{RequestStatus, DEFAULT_DIRECT_REASON};
use helpdesk_workflow::persistence::notification_repo::NotificationRepo;
use helpdesk_workflow::persistence::request_repo::RequestRepo;
use helpdesk_workflow::workflow::TransitionResult;
use helpdesk_workflow::AppError;

use super::test_helpers::Fixture;

fn requests(fx: &Fixture) -> RequestRepo {
    RequestRepo::new(Arc::clone(&fx.db))
}

fn notifications(fx: &Fixture) -> NotificationRepo {
    NotificationRepo::new(Arc::clone(&fx.db))
}

#[tokio::test]
async fn direct_change_then_closure_request() {
    let fx = Fixture::new().await;
    let ticket = fx.ticket_in(state::OPEN).await;

    let result = fx
        .state
        .engine
        .request_transition(&ticket.id, &fx.technician.id, state::DIAGNOSIS, "")
        .await
        .expect("diagnosis");
    assert_eq!(
        result,
        TransitionResult::Applied {
            new_state: state::DIAGNOSIS.to_owned()
        }
    );

    let history = requests(&fx).list_for_ticket(&ticket.id).await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, RequestStatus::Approved);
    assert_eq!(history[0].reason, DEFAULT_DIRECT_REASON);
    assert_eq!(history[0].approved_by.as_deref(), Some(fx.technician.id.as_str()));

    let result = fx
        .state
        .engine
        .request_transition(&ticket.id, &fx.technician.id, state::CLOSED, "ready")
        .await
        .expect("closure request");
    let TransitionResult::PendingApproval { request_id } = result else {
        panic!("expected pending approval, got {result:?}");
    };

    assert_eq!(fx.state_code(&ticket.id).await, state::DIAGNOSIS);
    let pending = requests(&fx)
        .get_by_id(&request_id)
        .await
        .expect("query")
        .expect("present");
    assert!(pending.is_pending());
    assert_eq!(pending.reason, "ready");

    for admin in [&fx.admin, &fx.second_admin] {
        let inbox = notifications(&fx)
            .list_for_user(&admin.id, false)
            .await
            .expect("inbox");
        assert!(
            inbox
                .iter()
                .any(|n| n.type_code == EventKind::ApprovalRequested.code()),
            "admin {} was not alerted",
            admin.display_name
        );
    }

    fx.shutdown().await;
}

#[tokio::test]
async fn state_change_notifies_client_and_ticket_admin() {
    let fx = Fixture::new().await;
    let ticket = fx.ticket_in(state::DIAGNOSIS).await;

    fx.state
        .engine
        .request_transition(&ticket.id, &fx.technician.id, state::IN_REPAIR, "replacing fan")
        .await
        .expect("transition");

    let repo = notifications(&fx);
    let client_inbox = repo.list_for_user(&fx.client.id, false).await.expect("client");
    assert_eq!(client_inbox.len(), 1);
    assert_eq!(client_inbox[0].type_code, EventKind::StateChanged.code());
    assert_eq!(
        client_inbox[0].extra_data.get("to_state").and_then(|v| v.as_str()),
        Some("In Repair")
    );
    assert_eq!(repo.list_for_user(&fx.admin.id, false).await.expect("admin").len(), 1);
    assert!(repo
        .list_for_user(&fx.second_admin.id, false)
        .await
        .expect("other admin")
        .is_empty());
    assert!(repo
        .list_for_user(&fx.technician.id, false)
        .await
        .expect("tech")
        .is_empty());

    let snapshot = fx.wait_for_deliveries(2).await;
    assert_eq!(snapshot.delivered, 2);

    fx.shutdown().await;
}

#[tokio::test]
async fn finalized_ticket_is_frozen() {
    let fx = Fixture::new().await;
    let ticket = fx.ticket_in(state::CLOSED).await;

    let err = fx
        .state
        .engine
        .request_transition(&ticket.id, &fx.technician.id, state::IN_REPAIR, "reopen")
        .await
        .expect_err("finalized");

    assert!(matches!(err, AppError::TicketFinalized(_)));
    assert_eq!(fx.state_code(&ticket.id).await, state::CLOSED);
    assert!(requests(&fx)
        .list_for_ticket(&ticket.id)
        .await
        .expect("history")
        .is_empty());

    fx.shutdown().await;
}

#[tokio::test]
async fn trial_cannot_close_directly() {
    let fx = Fixture::new().await;
    let ticket = fx.ticket_in(state::TRIAL).await;

    let err = fx
        .state
        .engine
        .request_transition(&ticket.id, &fx.technician.id, state::CLOSED, "done")
        .await
        .expect_err("invalid");

    assert!(matches!(err, AppError::InvalidTransition(_)));
    assert_eq!(fx.state_code(&ticket.id).await, state::TRIAL);

    fx.shutdown().await;
}

#[tokio::test]
async fn trial_to_pending_approval_writes_two_requests() {
    let fx = Fixture::new().await;
    let ticket = fx.ticket_in(state::TRIAL).await;

    let result = fx
        .state
        .engine
        .request_transition(
            &ticket.id,
            &fx.technician.id,
            state::TRIAL_PENDING_APPROVAL,
            "trial passed",
        )
        .await
        .expect("compound");

    assert_eq!(fx.state_code(&ticket.id).await, state::TRIAL_PENDING_APPROVAL);
    let history = requests(&fx).list_for_ticket(&ticket.id).await.expect("history");
    assert_eq!(history.len(), 2);

    let catalog = &fx.state.catalog;
    let trial = catalog.require(state::TRIAL).expect("trial").id;
    let tpa = catalog.require(state::TRIAL_PENDING_APPROVAL).expect("tpa").id;
    let closed = catalog.require(state::CLOSED).expect("closed").id;

    let audit = history
        .iter()
        .find(|r| r.status == RequestStatus::Approved)
        .expect("approved audit");
    assert_eq!((audit.from_state_id, audit.to_state_id), (trial, tpa));

    let pending = history.iter().find(|r| r.is_pending()).expect("pending");
    assert_eq!((pending.from_state_id, pending.to_state_id), (tpa, closed));
    assert_eq!(
        result,
        TransitionResult::PendingApproval {
            request_id: pending.id.clone()
        }
    );

    fx.shutdown().await;
}

#[tokio::test]
async fn pending_approval_locks_further_moves() {
    let fx = Fixture::new().await;
    let ticket = fx.ticket_in(state::TRIAL).await;
    let engine = &fx.state.engine;

    engine
        .request_transition(&ticket.id, &fx.technician.id, state::TRIAL_PENDING_APPROVAL, "")
        .await
        .expect("compound");
    let err = engine
        .request_transition(&ticket.id, &fx.technician.id, state::IN_REPAIR, "")
        .await
        .expect_err("locked");
    assert!(matches!(err, AppError::AwaitingApproval(_)));

    fx.shutdown().await;
}

#[tokio::test]
async fn open_generic_request_is_not_stacked() {
    let fx = Fixture::new().await;
    let ticket = fx.ticket_in(state::IN_REPAIR).await;
    let engine = &fx.state.engine;

    engine
        .request_transition(&ticket.id, &fx.technician.id, state::CLOSED, "unrepairable")
        .await
        .expect("first request");
    let err = engine
        .request_transition(&ticket.id, &fx.technician.id, state::CLOSED, "again")
        .await
        .expect_err("second request");

    assert!(matches!(err, AppError::AwaitingApproval(_)));
    assert_eq!(
        requests(&fx).list_for_ticket(&ticket.id).await.expect("history").len(),
        1
    );

    fx.shutdown().await;
}

#[tokio::test]
async fn only_assigned_technician_may_transition() {
    let fx = Fixture::new().await;
    let ticket = fx.ticket_in(state::OPEN).await;
    let engine = &fx.state.engine;

    let err = engine
        .request_transition(&ticket.id, &fx.admin.id, state::DIAGNOSIS, "")
        .await
        .expect_err("admin refused");
    assert!(matches!(err, AppError::NotAuthorized(_)));

    let err = engine
        .request_transition(&ticket.id, &fx.client.id, state::DIAGNOSIS, "")
        .await
        .expect_err("client refused");
    assert!(matches!(err, AppError::NotAuthorized(_)));

    let other_tech = helpdesk_workflow::persistence::user_repo::UserRepo::new(Arc::clone(&fx.db))
        .create(&helpdesk_workflow::models::user::User::new(
            "201".into(),
            "other@example.com".into(),
            "Other Tech".into(),
            helpdesk_workflow::models::user::Role::Technician,
        ))
        .await
        .expect("other tech");
    let err = engine
        .request_transition(&ticket.id, &other_tech.id, state::DIAGNOSIS, "")
        .await
        .expect_err("unassigned tech refused");
    assert!(matches!(err, AppError::NotAuthorized(_)));
    assert_eq!(fx.state_code(&ticket.id).await, state::OPEN);

    fx.shutdown().await;
}

#[tokio::test]
async fn unknown_ids_and_states() {
    let fx = Fixture::new().await;
    let ticket = fx.ticket_in(state::OPEN).await;
    let engine = &fx.state.engine;

    assert!(matches!(
        engine
            .request_transition("missing", &fx.technician.id, state::DIAGNOSIS, "")
            .await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        engine
            .request_transition(&ticket.id, "ghost", state::DIAGNOSIS, "")
            .await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        engine
            .request_transition(&ticket.id, &fx.technician.id, "archived", "")
            .await,
        Err(AppError::StateNotFound(_))
    ));

    fx.shutdown().await;
}

#[tokio::test]
async fn concurrent_closure_requests_open_one_approval() {
    let fx = Fixture::new().await;
    let ticket = fx.ticket_in(state::DIAGNOSIS).await;

    let first = fx.state.engine.clone();
    let second = fx.state.engine.clone();
    let (ticket_a, ticket_b) = (ticket.id.clone(), ticket.id.clone());
    let (tech_a, tech_b) = (fx.technician.id.clone(), fx.technician.id.clone());

    let a = tokio::spawn(async move {
        first
            .request_transition(&ticket_a, &tech_a, state::CLOSED, "a")
            .await
    });
    let b = tokio::spawn(async move {
        second
            .request_transition(&ticket_b, &tech_b, state::CLOSED, "b")
            .await
    });
    let outcomes = [a.await.expect("join a"), b.await.expect("join b")];

    let pending = outcomes
        .iter()
        .filter(|r| matches!(r, Ok(TransitionResult::PendingApproval { .. })))
        .count();
    let locked = outcomes
        .iter()
        .filter(|r| matches!(r, Err(AppError::AwaitingApproval(_))))
        .count();
    assert_eq!((pending, locked), (1, 1));
    assert_eq!(requests(&fx).list_pending().await.expect("pending").len(), 1);

    fx.shutdown().await;
}

#[tokio::test]
async fn failed_audit_write_rolls_back_the_move() {
    let fx = Fixture::new().await;
    let ticket = fx.ticket_in(state::OPEN).await;
    fx.break_request_writes().await;

    let err = fx
        .state
        .engine
        .request_transition(&ticket.id, &fx.technician.id, state::DIAGNOSIS, "")
        .await
        .expect_err("audit insert fails");

    assert!(matches!(err, AppError::Db(_)));
    assert_eq!(fx.state_code(&ticket.id).await, state::OPEN);
    assert_eq!(fx.request_count(&ticket.id).await, 0);

    fx.restore_request_writes().await;
    fx.state
        .engine
        .request_transition(&ticket.id, &fx.technician.id, state::DIAGNOSIS, "")
        .await
        .expect("retry after recovery");
    assert_eq!(fx.state_code(&ticket.id).await, state::DIAGNOSIS);

    fx.shutdown().await;
}

#[tokio::test]
async fn failed_pending_write_leaves_trial_untouched() {
    let fx = Fixture::new().await;
    let ticket = fx.ticket_in(state::TRIAL).await;
    fx.break_request_writes().await;

    let err = fx
        .state
        .engine
        .request_transition(&ticket.id, &fx.technician.id, state::TRIAL_PENDING_APPROVAL, "")
        .await
        .expect_err("request insert fails");

    assert!(matches!(err, AppError::Db(_)));
    assert_eq!(fx.state_code(&ticket.id).await, state::TRIAL);
    assert_eq!(fx.request_count(&ticket.id).await, 0);

    fx.restore_request_writes().await;
    fx.shutdown().await;
}
