//! Notification fan-out for ticket lifecycle events.
//!
//! For every valid recipient the dispatcher commits an in-app notification
//! and hands a rendered email to the [`DeliveryPool`]. It never fails the
//! caller: problems are logged and summarised in the [`DispatchReport`].

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::directory::UserDirectory;
use crate::models::notification::{EventKind, Notification, NotificationType};
use crate::models::ticket::Ticket;
use crate::models::user::{Role, User};
use crate::persistence::notification_repo::NotificationRepo;

use super::delivery::{DeliveryPool, EmailJob};
use super::templates::{self, TemplateContext};
use super::transport::OutgoingEmail;

/// Which of a ticket's stakeholders an event is addressed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecipientSpec {
    /// The ticket's client.
    pub client: bool,
    /// The assigned technician.
    pub technician: bool,
    /// The ticket's supervising admin.
    pub ticket_admin: bool,
    /// Every admin in the directory.
    pub all_admins: bool,
}

impl RecipientSpec {
    /// Every admin in the directory.
    #[must_use]
    pub fn admins() -> Self {
        Self {
            all_admins: true,
            ..Self::default()
        }
    }

    /// Client and assigned technician.
    #[must_use]
    pub fn stakeholders() -> Self {
        Self {
            client: true,
            technician: true,
            ..Self::default()
        }
    }

    /// Client and supervising admin.
    #[must_use]
    pub fn client_and_admin() -> Self {
        Self {
            client: true,
            ticket_admin: true,
            ..Self::default()
        }
    }
}

/// Content of one lifecycle event.
#[derive(Debug, Clone)]
pub struct Notice {
    /// Event kind; selects the notification type and email template.
    pub event: EventKind,
    /// Short headline.
    pub title: String,
    /// Body text.
    pub message: String,
    /// User whose action triggered the event.
    pub sent_by: Option<String>,
    /// Structured payload copied onto every notification.
    pub extra_data: Map<String, Value>,
}

impl Notice {
    /// Create a notice with no sender or payload.
    #[must_use]
    pub fn new(event: EventKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event,
            title: title.into(),
            message: message.into(),
            sent_by: None,
            extra_data: Map::new(),
        }
    }

    /// Record the triggering user.
    #[must_use]
    pub fn sent_by(mut self, user_id: impl Into<String>) -> Self {
        self.sent_by = Some(user_id.into());
        self
    }

    /// Attach one payload entry.
    #[must_use]
    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra_data.insert(key.to_owned(), value.into());
        self
    }
}

/// Summary of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// In-app notifications committed.
    pub internal_count: usize,
    /// Email jobs accepted by the delivery pool.
    pub emails_queued: usize,
    /// Emails that could not be handed to the pool.
    pub emails_failed: usize,
    /// Recipients dropped by validation.
    pub skipped: usize,
    /// Per-recipient failure messages.
    pub errors: Vec<String>,
}

/// Records notifications and queues their emails.
#[derive(Clone)]
pub struct NotificationDispatcher {
    repo: NotificationRepo,
    directory: Arc<dyn UserDirectory>,
    delivery: DeliveryPool,
}

impl NotificationDispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new(
        repo: NotificationRepo,
        directory: Arc<dyn UserDirectory>,
        delivery: DeliveryPool,
    ) -> Self {
        Self {
            repo,
            directory,
            delivery,
        }
    }

    /// Fan `notice` out to the recipients of `ticket` selected by `spec`.
    pub async fn notify(
        &self,
        ticket: &Ticket,
        spec: RecipientSpec,
        notice: Notice,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let recipients = self.resolve(ticket, spec, &mut report).await;
        let recipient_ids: BTreeSet<String> = recipients.iter().map(|u| u.id.clone()).collect();

        for user in &recipients {
            if let Err(err) = self
                .deliver_one(ticket, user, &recipient_ids, &notice, &mut report)
                .await
            {
                warn!(
                    ticket_id = %ticket.id,
                    user_id = %user.id,
                    %err,
                    "failed to record notification"
                );
                report.errors.push(format!("{}: {err}", user.id));
            }
        }

        info!(
            ticket_id = %ticket.id,
            event = notice.event.code(),
            internal = report.internal_count,
            queued = report.emails_queued,
            failed = report.emails_failed,
            skipped = report.skipped,
            "notification dispatched"
        );
        report
    }

    async fn deliver_one(
        &self,
        ticket: &Ticket,
        user: &User,
        recipient_ids: &BTreeSet<String>,
        notice: &Notice,
        report: &mut DispatchReport,
    ) -> crate::Result<()> {
        let kind = self
            .repo
            .get_or_create_type(&NotificationType::inferred(notice.event, user.role))
            .await?;

        let notification = Notification::sent(
            user.id.clone(),
            recipient_ids.clone(),
            Some(ticket.id.clone()),
            kind.code.clone(),
            notice.title.clone(),
            notice.message.clone(),
            notice.sent_by.clone(),
            notice.extra_data.clone(),
        );
        self.repo.insert(&notification).await?;
        report.internal_count += 1;

        if !kind.is_active {
            info!(
                user_id = %user.id,
                notification_type = %kind.code,
                "notification type inactive; email not sent"
            );
            return Ok(());
        }

        let rendered = templates::render(
            user.role,
            notice.event,
            &TemplateContext {
                recipient_name: &user.display_name,
                ticket_id: &ticket.id,
                ticket_title: &ticket.title,
                equipment: &ticket.equipment,
                title: &notice.title,
                message: &notice.message,
                extra: &notice.extra_data,
            },
        );
        let job = EmailJob {
            notification_id: notification.id,
            email: OutgoingEmail {
                to: user.email.clone(),
                subject: rendered.subject,
                html_body: rendered.html,
                text_body: rendered.text,
            },
        };

        match self.delivery.try_enqueue(job) {
            Ok(()) => report.emails_queued += 1,
            Err(err) => {
                warn!(user_id = %user.id, %err, "email not queued");
                report.emails_failed += 1;
                report.errors.push(format!("{}: {err}", user.id));
            }
        }
        Ok(())
    }

    /// Collect, de-duplicate, and validate the addressed users.
    async fn resolve(
        &self,
        ticket: &Ticket,
        spec: RecipientSpec,
        report: &mut DispatchReport,
    ) -> Vec<User> {
        let mut candidates: Vec<&str> = Vec::new();
        if spec.client {
            candidates.extend(ticket.client_id.as_deref());
        }
        if spec.technician {
            candidates.extend(ticket.technician_id.as_deref());
        }
        if spec.ticket_admin {
            candidates.extend(ticket.admin_id.as_deref());
        }

        let mut found: Vec<User> = Vec::new();
        for id in candidates {
            match self.directory.find_by_id(id).await {
                Ok(Some(user)) => found.push(user),
                Ok(None) => {
                    warn!(user_id = id, ticket_id = %ticket.id, "recipient not in directory");
                    report.skipped += 1;
                }
                Err(err) => {
                    warn!(user_id = id, %err, "recipient lookup failed");
                    report.errors.push(format!("{id}: {err}"));
                }
            }
        }
        if spec.all_admins {
            match self.directory.list_by_role(Role::Admin).await {
                Ok(admins) => found.extend(admins),
                Err(err) => {
                    warn!(%err, "admin lookup failed");
                    report.errors.push(format!("admins: {err}"));
                }
            }
        }

        let mut seen = HashSet::new();
        let mut valid = Vec::new();
        for user in found {
            if !seen.insert(user.id.clone()) {
                continue;
            }
            if !user.is_active {
                warn!(user_id = %user.id, "skipping inactive recipient");
                report.skipped += 1;
            } else if !is_valid_email(&user.email) {
                warn!(user_id = %user.id, email = %user.email, "skipping recipient without a usable email");
                report.skipped += 1;
            } else {
                valid.push(user);
            }
        }
        valid
    }
}

/// Loose syntactic email check: one `@`, no whitespace, dotted domain.
#[must_use]
pub fn is_valid_email(address: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(address.trim()))
}
