//! Ticket workflow: transitions, approvals, and history.

pub mod approval;
pub mod policy;
pub mod timeline;
pub mod transition;

pub use approval::{ApprovalWorkflow, Decision, Resolution};
pub use timeline::{TimelineEntry, TimelineService};
pub use transition::{TransitionEngine, TransitionResult};
