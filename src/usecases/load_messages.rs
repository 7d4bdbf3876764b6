use crate::domain::{
    errors::{FetchError, SourceError},
    message_sync::{MessagePage, DEFAULT_PAGE_SIZE},
    user::UserId,
};

const MAX_MESSAGES_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadMessagesQuery {
    pub participant_id: UserId,
    pub page: u32,
    pub limit: u32,
}

impl LoadMessagesQuery {
    #[cfg(test)]
    pub fn new(participant_id: UserId, page: u32) -> Self {
        Self {
            participant_id,
            page,
            limit: DEFAULT_PAGE_SIZE,
        }
    }

    fn normalized_page(&self) -> u32 {
        self.page.max(1)
    }

    fn normalized_limit(&self) -> u32 {
        match self.limit {
            0 => DEFAULT_PAGE_SIZE,
            value if value > MAX_MESSAGES_PAGE_SIZE => MAX_MESSAGES_PAGE_SIZE,
            value => value,
        }
    }
}

pub trait MessagesSource {
    fn fetch_page(
        &self,
        participant_id: &UserId,
        page: u32,
        limit: u32,
    ) -> Result<MessagePage, SourceError>;
}

impl<T> MessagesSource for &T
where
    T: MessagesSource + ?Sized,
{
    fn fetch_page(
        &self,
        participant_id: &UserId,
        page: u32,
        limit: u32,
    ) -> Result<MessagePage, SourceError> {
        (*self).fetch_page(participant_id, page, limit)
    }
}

pub fn load_messages(
    source: &dyn MessagesSource,
    query: LoadMessagesQuery,
) -> Result<MessagePage, FetchError> {
    let page = query.normalized_page();
    let limit = query.normalized_limit();

    let result = source.fetch_page(&query.participant_id, page, limit);
    if let Err(error) = &result {
        tracing::debug!(
            participant_id = %query.participant_id,
            page,
            error = ?error,
            "message page fetch failed"
        );
    }

    Ok(result?)
}
