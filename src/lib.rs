#![forbid(unsafe_code)]

//! Helpdesk ticket workflow service.
//!
//! Technicians move tickets through a fixed state lifecycle; closing a
//! ticket requires an admin decision. Every lifecycle event records in-app
//! notifications and queues emails for background delivery.

pub mod app;
pub mod config;
pub mod directory;
pub mod errors;
pub mod http;
pub mod models;
pub mod notify;
pub mod persistence;
pub mod workflow;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
