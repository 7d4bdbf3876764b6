//! Use case for sending a text message to a participant.
//!
//! This module provides the `MessageSender` trait and `send_message` function.
//! The server creates the direct conversation on the first message, so there
//! is no separate "create conversation" step.

use crate::domain::{
    errors::{FetchError, SendError, SourceError, ValidationError},
    message::Message,
    user::UserId,
};

/// Command to send a message to a specific participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageCommand {
    pub receiver_id: UserId,
    pub text: String,
}

/// Trait for delivering text messages to the server.
pub trait MessageSender {
    /// Sends `text` to `receiver_id` and returns the message as stored by the server.
    ///
    /// # Errors
    /// Returns `SourceError` if the message could not be sent.
    fn send_text(&self, receiver_id: &UserId, text: &str) -> Result<Message, SourceError>;
}

impl<T: MessageSender + ?Sized> MessageSender for &T {
    fn send_text(&self, receiver_id: &UserId, text: &str) -> Result<Message, SourceError> {
        (*self).send_text(receiver_id, text)
    }
}

/// Sends a message to the specified participant.
///
/// Validates the message text (must not be empty after trimming) and delegates
/// to the `MessageSender` implementation.
///
/// # Errors
/// Returns `SendError::Validation` if text is empty/whitespace, without
/// touching the sender. Maps source errors to `SendError::Request`.
pub fn send_message(
    sender: &dyn MessageSender,
    command: SendMessageCommand,
) -> Result<Message, SendError> {
    let text = command.text.trim();
    if text.is_empty() {
        return Err(ValidationError::EmptyMessage.into());
    }

    sender
        .send_text(&command.receiver_id, text)
        .map_err(|error| SendError::Request(FetchError::from(error)))
}
