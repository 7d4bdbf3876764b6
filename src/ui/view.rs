use std::collections::HashSet;

use crate::domain::{
    conversation::Conversation,
    message::{Message, MessageId},
    message_sync::SyncChange,
    session::SessionContext,
    user::User,
};

use super::message_rendering::{
    build_message_list_elements, element_lines, format_relative, MessageListElement,
    SenderLabels,
};

const PREVIEW_CHARS: usize = 60;

/// Tracks what the transcript already shows so updates print only new lines.
#[derive(Debug, Clone)]
pub struct ChatView {
    participant: User,
    printed: HashSet<MessageId>,
}

impl ChatView {
    pub fn new(participant: User) -> Self {
        Self {
            participant,
            printed: HashSet::new(),
        }
    }

    pub fn header_lines(&self) -> Vec<String> {
        vec![
            format!(
                "Chat with {} (+91 {})",
                self.participant.display_name(),
                self.participant.phone
            ),
            "Type /help for commands.".to_owned(),
            "Loading messages...".to_owned(),
        ]
    }

    pub fn on_change(
        &mut self,
        change: &SyncChange,
        messages: &[Message],
        has_more: bool,
        session: &SessionContext,
    ) -> Vec<String> {
        match change {
            SyncChange::Loaded => {
                let mut lines = self.full_transcript(messages, session);
                if messages.is_empty() {
                    lines.push("No messages yet. Say hi!".to_owned());
                } else if has_more {
                    lines.insert(0, "(older messages available: /more)".to_owned());
                }
                lines
            }
            SyncChange::LoadFailed(error) => {
                vec![format!("Could not load messages: {error}")]
            }
            SyncChange::Prepended(0) => vec!["No older messages.".to_owned()],
            SyncChange::Prepended(_) => {
                let mut lines = vec!["——— earlier history ———".to_owned()];
                lines.extend(self.full_transcript(messages, session));
                if !has_more {
                    lines.insert(1, "(start of conversation)".to_owned());
                }
                lines
            }
            SyncChange::OlderFailed(error) => {
                vec![format!("Could not load older messages: {error}")]
            }
            SyncChange::Refreshed | SyncChange::Appended => self.new_lines(messages, session),
            SyncChange::PollFailed(_) | SyncChange::Stale | SyncChange::Unchanged => Vec::new(),
        }
    }

    fn full_transcript(&mut self, messages: &[Message], session: &SessionContext) -> Vec<String> {
        self.printed.clear();
        let elements = build_message_list_elements(messages, self.labels(session));

        let mut lines = Vec::new();
        for element in &elements {
            if let MessageListElement::Message { id, .. } = element {
                self.printed.insert(id.clone());
            }
            lines.extend(element_lines(element));
        }
        lines
    }

    /// Lines for messages not printed yet, with the date separator that
    /// precedes them when it was not printed either.
    fn new_lines(&mut self, messages: &[Message], session: &SessionContext) -> Vec<String> {
        let elements = build_message_list_elements(messages, self.labels(session));

        let mut lines = Vec::new();
        let mut pending_separator: Option<&MessageListElement> = None;
        let mut day_already_shown = false;
        for element in &elements {
            match element {
                MessageListElement::DateSeparator(_) => {
                    pending_separator = Some(element);
                    day_already_shown = false;
                }
                MessageListElement::Message { id, .. } => {
                    if self.printed.contains(id) {
                        day_already_shown = true;
                        continue;
                    }
                    if let Some(separator) = pending_separator.take() {
                        if !day_already_shown {
                            lines.extend(element_lines(separator));
                        }
                    }
                    self.printed.insert(id.clone());
                    lines.extend(element_lines(element));
                    day_already_shown = true;
                }
            }
        }
        lines
    }

    fn labels<'a>(&'a self, session: &'a SessionContext) -> SenderLabels<'a> {
        SenderLabels {
            participant: &self.participant,
            session,
        }
    }
}

pub fn conversation_lines(conversations: &[Conversation], now_ms: i64) -> Vec<String> {
    if conversations.is_empty() {
        return vec!["No conversations yet. Start one with `convoo chat --phone <number>`.".to_owned()];
    }

    let mut lines = Vec::new();
    for (index, conversation) in conversations.iter().enumerate() {
        let Some(user) = conversation.counterpart() else {
            continue;
        };

        let when = conversation
            .last_message
            .as_ref()
            .and_then(|last| last.created_at_ms)
            .map(|at| format!(" · {}", format_relative(at, now_ms)))
            .unwrap_or_default();
        lines.push(format!(
            "{:>3}. {} (+91 {}) [id {}]{when}",
            index + 1,
            conversation.title(),
            user.phone,
            user.id
        ));

        if let Some(last) = &conversation.last_message {
            lines.push(format!("     {}", preview(&last.text)));
        }
    }
    lines
}

pub fn user_lines(users: &[User]) -> Vec<String> {
    if users.is_empty() {
        return vec!["No users found.".to_owned()];
    }

    users
        .iter()
        .map(|user| {
            format!(
                "{} (+91 {}) [id {}]",
                user.name.as_deref().filter(|name| !name.trim().is_empty()).unwrap_or("Unknown"),
                user.phone,
                user.id
            )
        })
        .collect()
}

fn preview(text: &str) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= PREVIEW_CHARS {
        return single_line;
    }

    let cut: String = single_line.chars().take(PREVIEW_CHARS - 1).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        conversation::{ConversationId, ConversationType, LastMessageSummary},
        errors::FetchError,
        message::DeliveryStatus,
        session::AuthToken,
        user::UserId,
    };

    const DAY_MS: i64 = 86_400_000;
    const BASE_MS: i64 = 1_771_000_000_000;

    fn participant() -> User {
        User {
            id: UserId("42".to_owned()),
            phone: "9876543210".to_owned(),
            name: Some("Asha".to_owned()),
        }
    }

    fn session() -> SessionContext {
        SessionContext::new(AuthToken::new("t"), Some(UserId("me".to_owned())))
    }

    fn msg(id: &str, at: i64) -> Message {
        Message {
            id: MessageId(id.to_owned()),
            sender_id: UserId("42".to_owned()),
            text: format!("text {id}"),
            created_at_ms: at,
            status: DeliveryStatus::Sent,
            attachments: vec![],
        }
    }

    fn count_containing(lines: &[String], needle: &str) -> usize {
        lines.iter().filter(|line| line.contains(needle)).count()
    }

    #[test]
    fn header_names_participant_and_phone() {
        let view = ChatView::new(participant());

        assert_eq!(view.header_lines()[0], "Chat with Asha (+91 9876543210)");
    }

    #[test]
    fn empty_initial_load_invites_first_message() {
        let mut view = ChatView::new(participant());

        let lines = view.on_change(&SyncChange::Loaded, &[], false, &session());

        assert_eq!(lines, vec!["No messages yet. Say hi!".to_owned()]);
    }

    #[test]
    fn refresh_prints_only_new_messages() {
        let mut view = ChatView::new(participant());
        let mut messages = vec![msg("m1", BASE_MS), msg("m2", BASE_MS + 60_000)];
        view.on_change(&SyncChange::Loaded, &messages, false, &session());

        messages.push(msg("m3", BASE_MS + 120_000));
        let lines = view.on_change(&SyncChange::Refreshed, &messages, false, &session());

        assert_eq!(count_containing(&lines, "text m3"), 1);
        assert_eq!(count_containing(&lines, "text m1"), 0);
        assert_eq!(count_containing(&lines, "———"), 0);
    }

    #[test]
    fn new_day_gets_its_separator() {
        let mut view = ChatView::new(participant());
        let mut messages = vec![msg("m1", BASE_MS)];
        view.on_change(&SyncChange::Loaded, &messages, false, &session());

        messages.push(msg("m2", BASE_MS + 2 * DAY_MS));
        let lines = view.on_change(&SyncChange::Appended, &messages, false, &session());

        assert_eq!(count_containing(&lines, "———"), 1);
        assert_eq!(count_containing(&lines, "text m2"), 1);
    }

    #[test]
    fn unchanged_and_failed_polls_print_nothing() {
        let mut view = ChatView::new(participant());

        assert!(view
            .on_change(&SyncChange::Unchanged, &[], false, &session())
            .is_empty());
        assert!(view
            .on_change(
                &SyncChange::PollFailed(FetchError::Network("x".to_owned())),
                &[],
                false,
                &session()
            )
            .is_empty());
    }

    #[test]
    fn load_failure_is_visible() {
        let mut view = ChatView::new(participant());

        let lines = view.on_change(
            &SyncChange::LoadFailed(FetchError::Unauthorized),
            &[],
            false,
            &session(),
        );

        assert!(lines[0].starts_with("Could not load messages"));
    }

    #[test]
    fn conversation_lines_show_name_preview_and_relative_time() {
        let conversations = vec![Conversation {
            id: Some(ConversationId("c1".to_owned())),
            participants: vec![participant()],
            last_message: Some(LastMessageSummary {
                text: "see you\nsoon".to_owned(),
                created_at_ms: Some(BASE_MS - 5 * 60_000),
            }),
            kind: ConversationType::Direct,
        }];

        let lines = conversation_lines(&conversations, BASE_MS);

        assert_eq!(
            lines,
            vec![
                "  1. Asha (+91 9876543210) [id 42] · 5 minutes ago".to_owned(),
                "     see you soon".to_owned(),
            ]
        );
    }

    #[test]
    fn user_lines_fall_back_to_unknown_name() {
        let users = vec![User {
            id: UserId("7".to_owned()),
            phone: "9000000000".to_owned(),
            name: None,
        }];

        assert_eq!(
            user_lines(&users),
            vec!["Unknown (+91 9000000000) [id 7]".to_owned()]
        );
    }

    #[test]
    fn long_previews_are_cut() {
        let text = "x".repeat(200);

        assert_eq!(preview(&text).chars().count(), PREVIEW_CHARS);
    }
}
