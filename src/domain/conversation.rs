use super::user::{User, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId(pub String);

/// Type of conversation. Only direct conversations are created by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationType {
    #[default]
    Direct,
    Group,
}

impl ConversationType {
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "group" => Self::Group,
            _ => Self::Direct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastMessageSummary {
    pub text: String,
    pub created_at_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// `None` for a direct conversation that the server creates on the first message.
    pub id: Option<ConversationId>,
    pub participants: Vec<User>,
    pub last_message: Option<LastMessageSummary>,
    pub kind: ConversationType,
}

impl Conversation {
    /// Placeholder for a direct conversation with a user we never talked to.
    pub fn placeholder_for(user: &User) -> Self {
        Self {
            id: None,
            participants: vec![user.clone()],
            last_message: None,
            kind: ConversationType::Direct,
        }
    }

    /// The other party of a direct conversation.
    pub fn counterpart(&self) -> Option<&User> {
        self.participants.first()
    }

    pub fn title(&self) -> &str {
        self.counterpart()
            .map(User::display_name)
            .unwrap_or("Unknown")
    }

    pub fn has_participant(&self, user_id: &UserId) -> bool {
        self.participants.iter().any(|p| &p.id == user_id)
    }
}

/// Picks the canonical conversation for `user`: an existing one when the user
/// already participates in a known conversation, a placeholder otherwise.
pub fn resolve_conversation(existing: &[Conversation], user: &User) -> Conversation {
    existing
        .iter()
        .find(|conversation| conversation.has_participant(&user.id))
        .cloned()
        .unwrap_or_else(|| Conversation::placeholder_for(user))
}
