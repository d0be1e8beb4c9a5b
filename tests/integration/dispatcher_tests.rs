//! Notification fan-out and background email delivery.

use std::sync::Arc;

use helpdesk_workflow::models::notification::{EventKind, NotificationStatus, NotificationType};
use helpdesk_workflow::models::user::Role;
use helpdesk_workflow::models::state;
use helpdesk_workflow::notify::{Notice, RecipientSpec, TransportError};
use helpdesk_workflow::persistence::notification_repo::NotificationRepo;
use helpdesk_workflow::persistence::user_repo::UserRepo;

use super::test_helpers::{FakeTransport, Fixture};

fn notice() -> Notice {
    Notice::new(
        EventKind::StateChanged,
        "Ticket moved",
        "The ticket changed state.",
    )
    .with_extra("to_state", "Diagnosis")
}

#[tokio::test]
async fn unreachable_relay_keeps_inbox_notifications() {
    let fx = Fixture::with_transport(FakeTransport::unreachable()).await;
    let ticket = fx.ticket_in(state::OPEN).await;

    let report = fx
        .state
        .dispatcher
        .notify(&ticket, RecipientSpec::stakeholders(), notice())
        .await;

    assert_eq!(report.internal_count, 2);
    assert_eq!(report.emails_queued, 2);
    assert_eq!(report.emails_failed, 0);
    assert!(report.errors.is_empty());

    let snapshot = fx.wait_for_deliveries(2).await;
    assert_eq!(snapshot.failed, 2);
    assert_eq!(snapshot.delivered, 0);
    // Three template attempts plus one plain-text fallback per email.
    assert_eq!(fx.transport.attempts(), 8);

    let repo = NotificationRepo::new(Arc::clone(&fx.db));
    for user in [&fx.client, &fx.technician] {
        let inbox = repo.list_for_user(&user.id, false).await.expect("inbox");
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].status, NotificationStatus::Sent);
        assert!(inbox[0].sent_at.is_some());
    }

    fx.shutdown().await;
}

#[tokio::test]
async fn recipients_are_deduplicated_and_share_the_recipient_set() {
    let fx = Fixture::new().await;
    // The ticket admin also appears among all admins.
    let ticket = fx.ticket_in(state::OPEN).await;
    let spec = RecipientSpec {
        ticket_admin: true,
        all_admins: true,
        ..RecipientSpec::default()
    };

    let report = fx.state.dispatcher.notify(&ticket, spec, notice()).await;
    assert_eq!(report.internal_count, 2);

    let repo = NotificationRepo::new(Arc::clone(&fx.db));
    let mine = repo.list_for_user(&fx.admin.id, false).await.expect("inbox");
    assert_eq!(mine.len(), 1);
    let expected: Vec<&str> = {
        let mut ids = vec![fx.admin.id.as_str(), fx.second_admin.id.as_str()];
        ids.sort_unstable();
        ids
    };
    let actual: Vec<&str> = mine[0].recipients.iter().map(String::as_str).collect();
    assert_eq!(actual, expected);
    assert_eq!(
        mine[0].extra_data.get("to_state").and_then(|v| v.as_str()),
        Some("Diagnosis")
    );

    fx.shutdown().await;
}

#[tokio::test]
async fn inactive_and_unreachable_users_are_skipped() {
    let fx = Fixture::new().await;
    let users = UserRepo::new(Arc::clone(&fx.db));
    users.set_active(&fx.client.id, false).await.expect("deactivate");

    let broken = helpdesk_workflow::models::user::User::new(
        "202".into(),
        "not-an-address".into(),
        "No Mail".into(),
        helpdesk_workflow::models::user::Role::Technician,
    );
    let broken = users.create(&broken).await.expect("create");

    let ticket = fx
        .ticket_in(state::OPEN)
        .await
        .with_technician(broken.id.clone());

    let report = fx
        .state
        .dispatcher
        .notify(&ticket, RecipientSpec::stakeholders(), notice())
        .await;

    assert_eq!(report.internal_count, 0);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.emails_queued, 0);

    fx.shutdown().await;
}

#[tokio::test]
async fn missing_recipient_counts_as_skipped() {
    let fx = Fixture::new().await;
    let ticket = fx.ticket_in(state::OPEN).await.with_client("ghost");

    let report = fx
        .state
        .dispatcher
        .notify(&ticket, RecipientSpec::stakeholders(), notice())
        .await;

    assert_eq!(report.internal_count, 1);
    assert_eq!(report.skipped, 1);

    fx.shutdown().await;
}

#[tokio::test]
async fn transient_failure_is_retried() {
    let transport = FakeTransport::scripted(
        vec![Err(TransportError::Transient("greylisted".into()))],
        Ok(()),
    );
    let fx = Fixture::with_transport(transport).await;
    let ticket = fx.ticket_in(state::OPEN).await;

    fx.state
        .dispatcher
        .notify(&ticket, RecipientSpec::admins(), notice())
        .await;

    let snapshot = fx.wait_for_deliveries(2).await;
    assert_eq!(snapshot.delivered, 2);
    assert_eq!(fx.transport.attempts(), 3);
    assert!(fx.transport.sent().iter().all(|e| e.html_body.is_some()));

    fx.shutdown().await;
}

#[tokio::test]
async fn plain_text_fallback_after_permanent_rejection() {
    let transport = FakeTransport::scripted(
        vec![Err(TransportError::Permanent("message too large".into()))],
        Ok(()),
    );
    let fx = Fixture::with_transport(transport).await;
    let ticket = fx.ticket_in(state::OPEN).await;
    let spec = RecipientSpec {
        client: true,
        ..RecipientSpec::default()
    };

    fx.state.dispatcher.notify(&ticket, spec, notice()).await;

    let snapshot = fx.wait_for_deliveries(1).await;
    assert_eq!(snapshot.fallback_delivered, 1);
    let sent = fx.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, fx.client.email);
    assert!(sent[0].html_body.is_none());

    fx.shutdown().await;
}

#[tokio::test]
async fn inactive_type_records_inbox_entry_without_email() {
    let fx = Fixture::new().await;
    let ticket = fx.ticket_in(state::OPEN).await;
    let repo = NotificationRepo::new(Arc::clone(&fx.db));
    repo.get_or_create_type(&NotificationType {
        is_active: false,
        ..NotificationType::inferred(EventKind::StateChanged, Role::Client)
    })
    .await
    .expect("disabled type");

    let spec = RecipientSpec {
        client: true,
        ..RecipientSpec::default()
    };
    let report = fx.state.dispatcher.notify(&ticket, spec, notice()).await;

    assert_eq!(report.internal_count, 1);
    assert_eq!(report.emails_queued, 0);
    assert_eq!(report.emails_failed, 0);
    assert_eq!(
        repo.list_for_user(&fx.client.id, false).await.expect("inbox").len(),
        1
    );
    assert_eq!(fx.transport.attempts(), 0);

    fx.shutdown().await;
}
