//! Message list rendering logic.
//!
//! Handles textual formatting of messages including:
//! - Sender grouping (consecutive messages from same sender show name only once)
//! - Date separators between messages from different days
//! - Delivery marks on own messages
//! - Relative times for the conversation list

use chrono::{Local, NaiveDate, TimeZone};

use crate::domain::{
    message::{Message, MessageId},
    session::SessionContext,
    user::User,
};

const INDENT: &str = "      ";

/// Represents a visual element in the messages list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageListElement {
    /// Date separator line (e.g., "——— 14 Feb 2026 ———").
    DateSeparator(String),
    Message {
        id: MessageId,
        time: String,
        sender: Option<String>,
        content: String,
        marker: Option<&'static str>,
    },
}

/// Decides how a sender is labelled. Ownership comes from the session only;
/// while the current user id is unknown, only the participant is named.
#[derive(Debug, Clone, Copy)]
pub struct SenderLabels<'a> {
    pub participant: &'a User,
    pub session: &'a SessionContext,
}

impl SenderLabels<'_> {
    fn label(&self, message: &Message) -> String {
        if self.session.is_own(message) == Some(true) {
            "You".to_owned()
        } else if message.sender_id == self.participant.id {
            self.participant.display_name().to_owned()
        } else {
            message.sender_id.to_string()
        }
    }
}

/// Builds a list of visual elements from messages.
///
/// Groups consecutive messages from the same sender and inserts date separators.
pub fn build_message_list_elements(
    messages: &[Message],
    labels: SenderLabels<'_>,
) -> Vec<MessageListElement> {
    let mut elements = Vec::new();
    let mut prev_date: Option<NaiveDate> = None;
    let mut prev_sender: Option<&str> = None;

    for message in messages {
        let msg_date = timestamp_to_date(message.created_at_ms);

        if prev_date != Some(msg_date) {
            elements.push(MessageListElement::DateSeparator(format_date(msg_date)));
            prev_sender = None;
        }

        let sender_key = message.sender_id.as_str();
        let sender = (prev_sender != Some(sender_key)).then(|| labels.label(message));
        let marker = (labels.session.is_own(message) == Some(true))
            .then(|| message.status.marker());

        elements.push(MessageListElement::Message {
            id: message.id.clone(),
            time: format_time(message.created_at_ms),
            sender,
            content: message.display_content(),
            marker,
        });

        prev_date = Some(msg_date);
        prev_sender = Some(sender_key);
    }

    elements
}

/// Renders elements as terminal lines.
pub fn element_lines(element: &MessageListElement) -> Vec<String> {
    match element {
        MessageListElement::DateSeparator(date) => vec![String::new(), format!("——— {date} ———")],
        MessageListElement::Message {
            time,
            sender,
            content,
            marker,
            ..
        } => message_lines(time, sender.as_deref(), content, *marker),
    }
}

fn message_lines(
    time: &str,
    sender: Option<&str>,
    content: &str,
    marker: Option<&str>,
) -> Vec<String> {
    let mut text_lines: Vec<String> = if content.is_empty() {
        vec!["[Empty message]".to_owned()]
    } else {
        content.lines().map(str::to_owned).collect()
    };

    if let (Some(marker), Some(last)) = (marker, text_lines.last_mut()) {
        last.push(' ');
        last.push_str(marker);
    }

    let mut lines = Vec::with_capacity(text_lines.len() + 1);
    let mut rest = text_lines.into_iter();
    match sender {
        Some(name) => {
            lines.push(format!("{time:>5} {name}:"));
            lines.extend(rest.map(|line| format!("{INDENT}{line}")));
        }
        None => {
            if let Some(first) = rest.next() {
                lines.push(format!("{time:>5} {first}"));
            }
            lines.extend(rest.map(|line| format!("{INDENT}{line}")));
        }
    }

    lines
}

/// "just now", "5 minutes ago", "3 days ago"; older than a week shows the date.
pub fn format_relative(timestamp_ms: i64, now_ms: i64) -> String {
    let elapsed_secs = (now_ms - timestamp_ms).max(0) / 1_000;

    let (amount, unit) = match elapsed_secs {
        0..=59 => return "just now".to_owned(),
        60..=3_599 => (elapsed_secs / 60, "minute"),
        3_600..=86_399 => (elapsed_secs / 3_600, "hour"),
        86_400..=604_799 => (elapsed_secs / 86_400, "day"),
        _ => return format_date(timestamp_to_date(timestamp_ms)),
    };

    let plural = if amount == 1 { "" } else { "s" };
    format!("{amount} {unit}{plural} ago")
}

fn timestamp_to_date(timestamp_ms: i64) -> NaiveDate {
    match Local.timestamp_millis_opt(timestamp_ms) {
        chrono::LocalResult::Single(dt) => dt.date_naive(),
        chrono::LocalResult::Ambiguous(dt, _) => dt.date_naive(),
        chrono::LocalResult::None => Local::now().date_naive(),
    }
}

fn format_date(date: NaiveDate) -> String {
    // Format: "14 Feb 2026"
    date.format("%-d %b %Y").to_string()
}

fn format_time(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms) {
        chrono::LocalResult::Single(dt) => dt.format("%H:%M").to_string(),
        chrono::LocalResult::Ambiguous(dt, _) => dt.format("%H:%M").to_string(),
        chrono::LocalResult::None => "??:??".to_owned(),
    }
}
