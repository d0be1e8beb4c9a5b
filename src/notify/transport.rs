//! Outbound email transport abstraction and the SMTP implementation.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::SmtpConfig;
use crate::{AppError, Result};

/// A fully rendered email ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML alternative; `None` sends plain text only.
    pub html_body: Option<String>,
    /// Plain-text body.
    pub text_body: String,
}

impl OutgoingEmail {
    /// Copy of this email without the HTML alternative.
    #[must_use]
    pub fn plain_only(&self) -> Self {
        Self {
            html_body: None,
            ..self.clone()
        }
    }
}

/// Transport failure taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection, timeout, or protocol hiccup; worth retrying.
    Transient(String),
    /// Rejected address or message; retrying the same payload will not help.
    Permanent(String),
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient(msg) => write!(f, "transient: {msg}"),
            Self::Permanent(msg) => write!(f, "permanent: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Boxed future returned by [`EmailTransport::send`].
pub type SendFuture<'a> =
    Pin<Box<dyn Future<Output = std::result::Result<(), TransportError>> + Send + 'a>>;

/// Anything that can deliver an [`OutgoingEmail`].
pub trait EmailTransport: Send + Sync {
    /// Deliver one email.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Transient`] for retryable failures and
    /// [`TransportError::Permanent`] otherwise.
    fn send(&self, email: OutgoingEmail) -> SendFuture<'_>;
}

/// SMTP relay transport backed by `lettre`.
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build a relay client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the sender address or relay host is invalid.
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = config
            .from_address
            .parse()
            .map_err(|err| AppError::Config(format!("invalid smtp.from_address: {err}")))?;

        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|err| AppError::Config(format!("invalid smtp relay: {err}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        let mut builder = builder.port(config.port);
        if let (Some(user), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        info!(host = %config.host, port = config.port, "smtp transport configured");
        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }

    fn build_message(&self, email: OutgoingEmail) -> std::result::Result<Message, TransportError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|err| TransportError::Permanent(format!("invalid recipient: {err}")))?;
        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject);

        let built = match email.html_body {
            Some(html) => {
                builder.multipart(MultiPart::alternative_plain_html(email.text_body, html))
            }
            None => builder.header(ContentType::TEXT_PLAIN).body(email.text_body),
        };
        built.map_err(|err| TransportError::Permanent(format!("failed to build email: {err}")))
    }
}

impl EmailTransport for SmtpMailer {
    fn send(&self, email: OutgoingEmail) -> SendFuture<'_> {
        Box::pin(async move {
            let message = self.build_message(email)?;
            self.mailer.send(message).await.map(|_| ()).map_err(|err| {
                if err.is_permanent() {
                    TransportError::Permanent(err.to_string())
                } else {
                    TransportError::Transient(err.to_string())
                }
            })
        })
    }
}
