use helpdesk_workflow::models::ticket::Ticket;
use helpdesk_workflow::models::user::{Role, User};
use helpdesk_workflow::workflow::policy::{authorize, ensure_active, ensure_assigned, Action};
use helpdesk_workflow::AppError;

fn user(role: Role) -> User {
    User::new("doc".into(), "u@example.com".into(), "User".into(), role)
}

#[test]
fn only_technicians_request_transitions() {
    assert!(authorize(Role::Technician, Action::RequestTransition).is_ok());
    assert!(matches!(
        authorize(Role::Client, Action::RequestTransition),
        Err(AppError::NotAuthorized(_))
    ));
    assert!(matches!(
        authorize(Role::Admin, Action::RequestTransition),
        Err(AppError::NotAuthorized(_))
    ));
}

#[test]
fn only_admins_resolve_and_list_approvals() {
    for action in [Action::ResolveApproval, Action::ListPendingApprovals] {
        assert!(authorize(Role::Admin, action).is_ok());
        assert!(authorize(Role::Technician, action).is_err());
        assert!(authorize(Role::Client, action).is_err());
    }
}

#[test]
fn every_role_reads_notifications_and_timelines() {
    for role in [Role::Client, Role::Technician, Role::Admin] {
        assert!(authorize(role, Action::ReadOwnNotifications).is_ok());
        assert!(authorize(role, Action::ViewTimeline).is_ok());
    }
}

#[test]
fn refusal_names_role_and_action() {
    let err = authorize(Role::Client, Action::ResolveApproval).expect_err("refused");
    let text = err.to_string();
    assert!(text.contains("client"), "{text}");
    assert!(text.contains("resolve approvals"), "{text}");
}

#[test]
fn inactive_user_is_refused() {
    let mut tech = user(Role::Technician);
    assert!(ensure_active(&tech).is_ok());
    tech.is_active = false;
    assert!(matches!(ensure_active(&tech), Err(AppError::NotAuthorized(_))));
}

#[test]
fn assignment_check_requires_matching_technician() {
    let tech = user(Role::Technician);
    let other = user(Role::Technician);
    let ticket = Ticket::new("Printer".into(), "jam".into(), "HP 4000".into(), 1)
        .with_technician(tech.id.clone());

    assert!(ensure_assigned(&tech, &ticket).is_ok());
    assert!(matches!(
        ensure_assigned(&other, &ticket),
        Err(AppError::NotAuthorized(_))
    ));
}

#[test]
fn unassigned_ticket_refuses_everyone() {
    let tech = user(Role::Technician);
    let ticket = Ticket::new("Laptop".into(), "no boot".into(), "X1".into(), 1);
    assert!(ensure_assigned(&tech, &ticket).is_err());
}
