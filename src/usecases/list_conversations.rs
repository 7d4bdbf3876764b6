use crate::domain::{
    conversation::Conversation,
    errors::{FetchError, SourceError},
};

pub trait ConversationsSource {
    fn list_conversations(&self) -> Result<Vec<Conversation>, SourceError>;
}

impl<T> ConversationsSource for &T
where
    T: ConversationsSource + ?Sized,
{
    fn list_conversations(&self) -> Result<Vec<Conversation>, SourceError> {
        (*self).list_conversations()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListConversationsOutput {
    pub conversations: Vec<Conversation>,
}

pub fn list_conversations(
    source: &dyn ConversationsSource,
) -> Result<ListConversationsOutput, FetchError> {
    let mut conversations = source.list_conversations()?;

    // A conversation without participants cannot be opened.
    let before = conversations.len();
    conversations.retain(|conversation| conversation.counterpart().is_some());
    if conversations.len() != before {
        tracing::warn!(
            dropped = before - conversations.len(),
            "conversations without participants skipped"
        );
    }

    Ok(ListConversationsOutput { conversations })
}
