//! Domain layer: core entities and business rules.

pub mod conversation;
pub mod errors;
pub mod events;
pub mod message;
pub mod message_sync;
pub mod session;
pub mod user;

/// Returns the domain module name for smoke checks.
pub fn module_name() -> &'static str {
    "domain"
}
