//! Use case layer: application workflows and orchestration.

pub mod bootstrap;
pub mod context;
pub mod contracts;
pub mod guided_auth;
pub mod list_conversations;
pub mod load_messages;
pub mod logout;
pub mod message_sync;
pub mod search_users;
pub mod send_message;

/// Returns the usecases module name for smoke checks.
pub fn module_name() -> &'static str {
    "usecases"
}
