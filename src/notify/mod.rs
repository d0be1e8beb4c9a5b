//! Notification fan-out: in-app records, email rendering, and delivery.

pub mod delivery;
pub mod dispatcher;
pub mod inbox;
pub mod templates;
pub mod transport;

pub use delivery::{DeliveryPool, DeliveryRuntime, DeliverySnapshot};
pub use dispatcher::{DispatchReport, Notice, NotificationDispatcher, RecipientSpec};
pub use inbox::NotificationInbox;
pub use transport::{EmailTransport, OutgoingEmail, SmtpMailer, TransportError};
