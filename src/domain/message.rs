use super::user::UserId;

/// Server-assigned message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub String);

impl MessageId {
    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Delivery status reported by the server for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryStatus {
    #[default]
    Sent,
    Delivered,
    Read,
}

impl DeliveryStatus {
    /// Parses the wire label; unknown labels fall back to `Sent`.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "delivered" => Self::Delivered,
            "read" | "seen" => Self::Read,
            _ => Self::Sent,
        }
    }

    /// Short check-mark indicator shown next to own messages.
    pub fn marker(self) -> &'static str {
        match self {
            Self::Sent => "✓",
            Self::Delivered => "✓✓",
            Self::Read => "✓✓ read",
        }
    }
}

/// Attachment metadata. Carried through from the server, never rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub url: String,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub text: String,
    pub created_at_ms: i64,
    pub status: DeliveryStatus,
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Returns the text to display, with a placeholder for attachment-only messages.
    pub fn display_content(&self) -> String {
        match (self.attachments.len(), self.text.is_empty()) {
            (0, _) => self.text.clone(),
            (count, true) => format!("[{count} attachment(s)]"),
            (count, false) => format!("[{count} attachment(s)] {}", self.text),
        }
    }
}
