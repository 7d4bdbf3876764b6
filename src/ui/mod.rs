//! UI layer: the line-based console shell and its rendering.

mod commands;
pub mod event_source;
mod message_rendering;
pub mod shell;
pub mod view;

/// Returns the UI module name for smoke checks.
pub fn module_name() -> &'static str {
    "ui"
}
