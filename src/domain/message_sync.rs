//! Message list state for the open conversation.
//!
//! Every network round-trip is split into a `begin_*` call that hands out a
//! request tagged with the conversation generation, and an `apply_*` call that
//! folds the result back in. Results carrying an outdated generation are
//! reported as [`SyncChange::Stale`] and never touch the current state, so the
//! caller may complete requests in any order.

use std::collections::HashSet;

use super::{
    errors::{FetchError, SendError, ValidationError},
    message::{Message, MessageId},
    user::UserId,
};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Loading,
    Ready,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub page: u32,
    pub has_more: bool,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            page: 1,
            has_more: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Initial,
    Older,
    Poll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub generation: u64,
    pub participant_id: UserId,
    pub kind: PageKind,
    pub page: u32,
    pub limit: u32,
    /// Monotonic per conversation for polls, zero otherwise.
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub generation: u64,
    pub participant_id: UserId,
    pub text: String,
}

/// One page of history as returned by the server, ascending by creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub page: u32,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncChange {
    /// Result belonged to a closed or replaced conversation and was dropped.
    Stale,
    Unchanged,
    Loaded,
    LoadFailed(FetchError),
    Prepended(usize),
    OlderFailed(FetchError),
    Refreshed,
    PollFailed(FetchError),
    Appended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSyncState {
    generation: u64,
    participant_id: Option<UserId>,
    phase: SyncPhase,
    messages: Vec<Message>,
    cursor: PageCursor,
    page_size: u32,
    older_in_flight: bool,
    poll_in_flight: bool,
    refresh_pending: bool,
    pending_send: Option<String>,
    last_poll_sequence: u64,
    last_applied_poll: u64,
}

impl Default for MessageSyncState {
    fn default() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }
}

impl MessageSyncState {
    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            generation: 0,
            participant_id: None,
            phase: SyncPhase::Idle,
            messages: Vec::new(),
            cursor: PageCursor::default(),
            page_size: if page_size == 0 {
                DEFAULT_PAGE_SIZE
            } else {
                page_size
            },
            older_in_flight: false,
            poll_in_flight: false,
            refresh_pending: false,
            pending_send: None,
            last_poll_sequence: 0,
            last_applied_poll: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[cfg(test)]
    pub fn participant_id(&self) -> Option<&UserId> {
        self.participant_id.as_ref()
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    /// Text of the send currently awaiting confirmation.
    pub fn pending_send(&self) -> Option<&str> {
        self.pending_send.as_deref()
    }

    pub fn is_loading_older(&self) -> bool {
        self.older_in_flight
    }

    /// Resets all state for `participant_id` and returns the page-1 request.
    pub fn open(&mut self, participant_id: UserId) -> PageRequest {
        self.generation += 1;
        self.participant_id = Some(participant_id.clone());
        self.phase = SyncPhase::Loading;
        self.clear_conversation_state();

        PageRequest {
            generation: self.generation,
            participant_id,
            kind: PageKind::Initial,
            page: 1,
            limit: self.page_size,
            sequence: 0,
        }
    }

    /// Drops the conversation. Returns `false` when nothing was open.
    pub fn close(&mut self) -> bool {
        if matches!(self.phase, SyncPhase::Idle | SyncPhase::Closed) {
            return false;
        }

        self.generation += 1;
        self.participant_id = None;
        self.phase = SyncPhase::Closed;
        self.clear_conversation_state();
        true
    }

    pub fn apply_initial(
        &mut self,
        request: &PageRequest,
        result: Result<MessagePage, FetchError>,
    ) -> SyncChange {
        if request.kind != PageKind::Initial
            || !self.is_current(request.generation, &request.participant_id)
            || self.phase != SyncPhase::Loading
        {
            return SyncChange::Stale;
        }

        self.phase = SyncPhase::Ready;
        match result {
            Ok(page) => {
                self.messages = normalize(page.messages);
                self.cursor = PageCursor {
                    page: request.page,
                    has_more: page.has_more,
                };
                SyncChange::Loaded
            }
            Err(error) => {
                self.messages.clear();
                self.cursor = PageCursor::default();
                SyncChange::LoadFailed(error)
            }
        }
    }

    /// Next-page request, or `None` when there is no more history or a load is pending.
    pub fn begin_load_older(&mut self) -> Option<PageRequest> {
        if self.phase != SyncPhase::Ready || !self.cursor.has_more || self.older_in_flight {
            return None;
        }

        let participant_id = self.participant_id.clone()?;
        self.older_in_flight = true;

        Some(PageRequest {
            generation: self.generation,
            participant_id,
            kind: PageKind::Older,
            page: self.cursor.page + 1,
            limit: self.page_size,
            sequence: 0,
        })
    }

    pub fn apply_older(
        &mut self,
        request: &PageRequest,
        result: Result<MessagePage, FetchError>,
    ) -> SyncChange {
        if request.kind != PageKind::Older
            || !self.is_current(request.generation, &request.participant_id)
        {
            return SyncChange::Stale;
        }

        self.older_in_flight = false;
        match result {
            Ok(page) => {
                let known: HashSet<&MessageId> = self.messages.iter().map(|m| &m.id).collect();
                let mut combined: Vec<Message> = page
                    .messages
                    .into_iter()
                    .filter(|message| !known.contains(&message.id))
                    .collect();
                let added = combined.len();

                combined.append(&mut self.messages);
                self.messages = normalize(combined);
                self.cursor = PageCursor {
                    page: request.page,
                    has_more: page.has_more,
                };
                SyncChange::Prepended(added)
            }
            Err(error) => SyncChange::OlderFailed(error),
        }
    }

    /// Poll request for the most recent window, or `None` while another poll is pending.
    pub fn begin_poll(&mut self) -> Option<PageRequest> {
        if self.phase != SyncPhase::Ready || self.poll_in_flight {
            return None;
        }

        let participant_id = self.participant_id.clone()?;
        self.poll_in_flight = true;
        self.last_poll_sequence += 1;

        Some(PageRequest {
            generation: self.generation,
            participant_id,
            kind: PageKind::Poll,
            page: 1,
            limit: self.page_size,
            sequence: self.last_poll_sequence,
        })
    }

    /// Like [`Self::begin_poll`], but a refresh requested while a poll is
    /// pending is remembered and handed out by [`Self::take_pending_refresh`].
    pub fn request_refresh(&mut self) -> Option<PageRequest> {
        if self.phase != SyncPhase::Ready {
            return None;
        }

        if self.poll_in_flight {
            self.refresh_pending = true;
            return None;
        }

        self.begin_poll()
    }

    pub fn take_pending_refresh(&mut self) -> Option<PageRequest> {
        if !self.refresh_pending || self.poll_in_flight {
            return None;
        }

        self.refresh_pending = false;
        self.begin_poll()
    }

    pub fn apply_poll(
        &mut self,
        request: &PageRequest,
        result: Result<MessagePage, FetchError>,
    ) -> SyncChange {
        if request.kind != PageKind::Poll
            || !self.is_current(request.generation, &request.participant_id)
        {
            return SyncChange::Stale;
        }

        if request.sequence == self.last_poll_sequence {
            self.poll_in_flight = false;
        }

        if request.sequence <= self.last_applied_poll {
            return SyncChange::Stale;
        }

        let page = match result {
            Ok(page) => page,
            Err(error) => return SyncChange::PollFailed(error),
        };
        self.last_applied_poll = request.sequence;

        let window = normalize(page.messages);
        let Some(window_last) = window.last() else {
            return SyncChange::Unchanged;
        };

        if self.messages.last().map(|m| &m.id) == Some(&window_last.id) {
            return SyncChange::Unchanged;
        }

        let merged = reconcile_window(&self.messages, window);
        if merged == self.messages {
            return SyncChange::Unchanged;
        }

        self.messages = merged;
        SyncChange::Refreshed
    }

    pub fn begin_send(&mut self, text: &str) -> Result<SendRequest, SendError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }

        if self.phase != SyncPhase::Ready {
            return Err(SendError::NotReady);
        }

        if self.pending_send.is_some() {
            return Err(SendError::AlreadySending);
        }

        let participant_id = self.participant_id.clone().ok_or(SendError::NotReady)?;
        self.pending_send = Some(text.to_owned());

        Ok(SendRequest {
            generation: self.generation,
            participant_id,
            text: text.to_owned(),
        })
    }

    /// Appends the server-confirmed message. A failed send leaves the sequence untouched.
    pub fn apply_send(
        &mut self,
        request: &SendRequest,
        result: Result<Message, SendError>,
    ) -> Result<SyncChange, SendError> {
        if !self.is_current(request.generation, &request.participant_id) {
            return Ok(SyncChange::Stale);
        }

        self.pending_send = None;
        let message = result?;

        if self.messages.iter().any(|known| known.id == message.id) {
            return Ok(SyncChange::Unchanged);
        }

        let position = self
            .messages
            .partition_point(|known| known.created_at_ms <= message.created_at_ms);
        self.messages.insert(position, message);
        Ok(SyncChange::Appended)
    }

    fn is_current(&self, generation: u64, participant_id: &UserId) -> bool {
        self.generation == generation
            && self.participant_id.as_ref() == Some(participant_id)
            && matches!(self.phase, SyncPhase::Loading | SyncPhase::Ready)
    }

    fn clear_conversation_state(&mut self) {
        self.messages.clear();
        self.cursor = PageCursor::default();
        self.older_in_flight = false;
        self.poll_in_flight = false;
        self.refresh_pending = false;
        self.pending_send = None;
        self.last_poll_sequence = 0;
        self.last_applied_poll = 0;
    }
}

/// Merges the server's latest window into `local` by message id.
///
/// The window is authoritative for the time range strictly inside it. Local
/// messages at or before its first timestamp are history; local messages at
/// or after its last timestamp are confirmed sends the window predates.
fn reconcile_window(local: &[Message], window: Vec<Message>) -> Vec<Message> {
    let (Some(first), Some(last)) = (window.first(), window.last()) else {
        return local.to_vec();
    };
    let (window_start, window_end) = (first.created_at_ms, last.created_at_ms);
    let window_ids: HashSet<&MessageId> = window.iter().map(|m| &m.id).collect();

    let mut merged: Vec<Message> = local
        .iter()
        .filter(|m| m.created_at_ms <= window_start && !window_ids.contains(&m.id))
        .cloned()
        .collect();
    let newer: Vec<Message> = local
        .iter()
        .filter(|m| m.created_at_ms >= window_end && !window_ids.contains(&m.id))
        .cloned()
        .collect();

    merged.extend(window);
    merged.extend(newer);
    normalize(merged)
}

/// Stable sort by creation time, first occurrence wins on duplicate ids.
fn normalize(mut messages: Vec<Message>) -> Vec<Message> {
    messages.sort_by_key(|message| message.created_at_ms);
    let mut seen = HashSet::new();
    messages.retain(|message| seen.insert(message.id.clone()));
    messages
}
