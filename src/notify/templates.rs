//! Email body builders keyed by recipient role and lifecycle event.
//!
//! Pairs without a dedicated template fall back to [`generic`], which
//! renders plain text only.

use serde_json::{Map, Value};

use crate::models::notification::EventKind;
use crate::models::user::Role;

/// Values substituted into an email template.
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    /// Greeting name of the recipient.
    pub recipient_name: &'a str,
    /// Ticket identifier.
    pub ticket_id: &'a str,
    /// Ticket title.
    pub ticket_title: &'a str,
    /// Equipment under service.
    pub equipment: &'a str,
    /// Notification headline.
    pub title: &'a str,
    /// Notification body.
    pub message: &'a str,
    /// Event-specific payload (`from_state`, `to_state`, `rejection_reason`, ...).
    pub extra: &'a Map<String, Value>,
}

impl TemplateContext<'_> {
    fn extra_str(&self, key: &str) -> &str {
        self.extra.get(key).and_then(Value::as_str).unwrap_or("")
    }
}

/// Rendered subject and bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    /// Subject line.
    pub subject: String,
    /// HTML alternative, absent for the generic template.
    pub html: Option<String>,
    /// Plain-text body.
    pub text: String,
}

/// Render the template mapped to `(role, event)`, or the generic fallback.
#[must_use]
pub fn render(role: Role, event: EventKind, ctx: &TemplateContext<'_>) -> RenderedEmail {
    match (role, event) {
        (Role::Admin, EventKind::ApprovalRequested) => approval_requested(ctx),
        (Role::Client | Role::Technician, EventKind::TicketFinalized) => ticket_finalized(ctx),
        (Role::Client | Role::Technician, EventKind::ApprovalRejected) => approval_rejected(ctx),
        (Role::Client | Role::Admin, EventKind::StateChanged) => state_changed(ctx),
        _ => generic(ctx),
    }
}

/// Plain-text template used when no specific mapping exists.
#[must_use]
pub fn generic(ctx: &TemplateContext<'_>) -> RenderedEmail {
    RenderedEmail {
        subject: ctx.title.to_owned(),
        html: None,
        text: format!(
            "Hello {name},\n\n{message}\n\nTicket: {title} ({id})\n",
            name = ctx.recipient_name,
            message = ctx.message,
            title = ctx.ticket_title,
            id = ctx.ticket_id,
        ),
    }
}

fn approval_requested(ctx: &TemplateContext<'_>) -> RenderedEmail {
    let from = ctx.extra_str("from_state");
    let to = ctx.extra_str("to_state");
    let reason = ctx.extra_str("reason");
    let text = format!(
        "Hello {name},\n\nTicket \"{title}\" ({id}) needs your decision.\n\
         Requested move: {from} -> {to}\nEquipment: {equipment}\nReason: {reason}\n\n{message}\n",
        name = ctx.recipient_name,
        title = ctx.ticket_title,
        id = ctx.ticket_id,
        equipment = ctx.equipment,
        message = ctx.message,
    );
    let html = layout(
        ctx,
        &format!(
            "<p>Ticket <strong>{title}</strong> needs your decision.</p>\
             <ul><li>Requested move: {from} &rarr; {to}</li>\
             <li>Equipment: {equipment}</li><li>Reason: {reason}</li></ul>",
            title = escape_html(ctx.ticket_title),
            from = escape_html(from),
            to = escape_html(to),
            equipment = escape_html(ctx.equipment),
            reason = escape_html(reason),
        ),
    );
    RenderedEmail {
        subject: format!("[Approval required] {}", ctx.ticket_title),
        html: Some(html),
        text,
    }
}

fn ticket_finalized(ctx: &TemplateContext<'_>) -> RenderedEmail {
    let text = format!(
        "Hello {name},\n\nTicket \"{title}\" ({id}) has been closed.\n\
         Equipment: {equipment}\n\n{message}\n",
        name = ctx.recipient_name,
        title = ctx.ticket_title,
        id = ctx.ticket_id,
        equipment = ctx.equipment,
        message = ctx.message,
    );
    let html = layout(
        ctx,
        &format!(
            "<p>Ticket <strong>{title}</strong> has been closed.</p><p>Equipment: {equipment}</p>",
            title = escape_html(ctx.ticket_title),
            equipment = escape_html(ctx.equipment),
        ),
    );
    RenderedEmail {
        subject: format!("[Closed] {}", ctx.ticket_title),
        html: Some(html),
        text,
    }
}

fn approval_rejected(ctx: &TemplateContext<'_>) -> RenderedEmail {
    let reason = ctx.extra_str("rejection_reason");
    let state = ctx.extra_str("to_state");
    let text = format!(
        "Hello {name},\n\nA request on ticket \"{title}\" ({id}) was rejected. \
         The ticket is now {state}.\nReason: {reason}\n\n{message}\n",
        name = ctx.recipient_name,
        title = ctx.ticket_title,
        id = ctx.ticket_id,
        message = ctx.message,
    );
    let html = layout(
        ctx,
        &format!(
            "<p>A request on ticket <strong>{title}</strong> was rejected. \
             The ticket is now {state}.</p><p>Reason: {reason}</p>",
            title = escape_html(ctx.ticket_title),
            state = escape_html(state),
            reason = escape_html(reason),
        ),
    );
    RenderedEmail {
        subject: format!("[Request rejected] {}", ctx.ticket_title),
        html: Some(html),
        text,
    }
}

fn state_changed(ctx: &TemplateContext<'_>) -> RenderedEmail {
    let from = ctx.extra_str("from_state");
    let to = ctx.extra_str("to_state");
    let text = format!(
        "Hello {name},\n\nTicket \"{title}\" ({id}) moved from {from} to {to}.\n\n{message}\n",
        name = ctx.recipient_name,
        title = ctx.ticket_title,
        id = ctx.ticket_id,
        message = ctx.message,
    );
    let html = layout(
        ctx,
        &format!(
            "<p>Ticket <strong>{title}</strong> moved from {from} to {to}.</p>",
            title = escape_html(ctx.ticket_title),
            from = escape_html(from),
            to = escape_html(to),
        ),
    );
    RenderedEmail {
        subject: format!("[{to}] {}", ctx.ticket_title),
        html: Some(html),
        text,
    }
}

fn layout(ctx: &TemplateContext<'_>, body: &str) -> String {
    format!(
        "<html><body><p>Hello {name},</p>{body}<p>{message}</p>\
         <p style=\"color:#888\">Ticket {id}</p></body></html>",
        name = escape_html(ctx.recipient_name),
        message = escape_html(ctx.message),
        id = escape_html(ctx.ticket_id),
    )
}

/// Escape the five HTML-significant characters.
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
