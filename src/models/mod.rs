//! Domain model module declarations.

pub mod notification;
pub mod state;
pub mod state_change;
pub mod ticket;
pub mod user;
