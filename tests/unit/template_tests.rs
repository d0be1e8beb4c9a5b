use serde_json::{json, Map, Value};

use helpdesk_workflow::models::notification::EventKind;
use helpdesk_workflow::models::user::Role;
use helpdesk_workflow::notify::templates::{
    escape_html, generic, render, RenderedEmail, TemplateContext,
};

fn extra() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("from_state".into(), json!("Trial"));
    map.insert("to_state".into(), json!("Closed"));
    map.insert("reason".into(), json!("customer confirmed"));
    map.insert("rejection_reason".into(), json!("still overheating"));
    map
}

fn render_for(role: Role, event: EventKind, extra: &Map<String, Value>) -> RenderedEmail {
    render(
        role,
        event,
        &TemplateContext {
            recipient_name: "Ana",
            ticket_id: "T-1",
            ticket_title: "Laptop <fan>",
            equipment: "ThinkPad",
            title: "Headline",
            message: "Body text",
            extra,
        },
    )
}

#[test]
fn admin_approval_email_names_the_move() {
    let extra = extra();
    let email = render_for(Role::Admin, EventKind::ApprovalRequested, &extra);
    assert!(email.subject.starts_with("[Approval required]"));
    assert!(email.text.contains("Trial -> Closed"));
    assert!(email.text.contains("customer confirmed"));
    assert!(email.html.is_some());
}

#[test]
fn rejection_email_carries_reason() {
    let extra = extra();
    let email = render_for(Role::Technician, EventKind::ApprovalRejected, &extra);
    assert!(email.text.contains("still overheating"));
    assert!(email.html.as_deref().is_some_and(|h| h.contains("still overheating")));
}

#[test]
fn rejection_email_names_the_resulting_state() {
    let mut extra = extra();
    extra.insert("to_state".into(), json!("Diagnosis"));
    let email = render_for(Role::Client, EventKind::ApprovalRejected, &extra);
    assert!(email.subject.starts_with("[Request rejected]"));
    assert!(email.text.contains("The ticket is now Diagnosis."));
    assert!(!email.text.contains("repair"));
    assert!(email
        .html
        .as_deref()
        .is_some_and(|h| h.contains("The ticket is now Diagnosis.")));
}

#[test]
fn finalized_email_for_client() {
    let extra = extra();
    let email = render_for(Role::Client, EventKind::TicketFinalized, &extra);
    assert!(email.subject.starts_with("[Closed]"));
    assert!(email.text.contains("has been closed"));
}

#[test]
fn html_bodies_escape_ticket_text() {
    let extra = extra();
    let email = render_for(Role::Client, EventKind::StateChanged, &extra);
    let html = email.html.expect("html body");
    assert!(html.contains("Laptop &lt;fan&gt;"));
    assert!(!html.contains("<fan>"));
}

#[test]
fn unmapped_pair_uses_plain_text_fallback() {
    let extra = Map::new();
    let email = render_for(Role::Client, EventKind::ApprovalRequested, &extra);
    assert!(email.html.is_none());
    assert_eq!(email.subject, "Headline");
    assert!(email.text.contains("Hello Ana"));
    assert!(email.text.contains("Body text"));
}

#[test]
fn generic_matches_fallback() {
    let extra = Map::new();
    let ctx = TemplateContext {
        recipient_name: "Ana",
        ticket_id: "T-1",
        ticket_title: "Laptop <fan>",
        equipment: "ThinkPad",
        title: "Headline",
        message: "Body text",
        extra: &extra,
    };
    assert_eq!(generic(&ctx), render(Role::Technician, EventKind::StateChanged, &ctx));
}

#[test]
fn missing_extra_keys_render_empty() {
    let extra = Map::new();
    let email = render_for(Role::Admin, EventKind::ApprovalRequested, &extra);
    assert!(email.text.contains("Requested move:  -> "));
}

#[test]
fn escape_html_covers_special_characters() {
    assert_eq!(
        escape_html(r#"<a href="x">'&'</a>"#),
        "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
    );
}
