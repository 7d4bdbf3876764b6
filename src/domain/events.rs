use super::{
    errors::{FetchError, SendError},
    message::Message,
    message_sync::{MessagePage, PageRequest, SendRequest},
};

/// Everything the chat loop reacts to, funneled through one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Poll timer fired for the conversation opened with `generation`.
    PollTick { generation: u64 },
    /// Out-of-band refresh scheduled after a confirmed send.
    RefreshDue { generation: u64 },
    PageFetched {
        request: PageRequest,
        result: Result<MessagePage, FetchError>,
    },
    SendCompleted {
        request: SendRequest,
        result: Result<Message, SendError>,
    },
    Input(String),
    InputClosed,
}
