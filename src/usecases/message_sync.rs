//! Drives [`MessageSyncState`] for the chat loop.
//!
//! Network calls run through a [`TaskDispatcher`] and report back as
//! [`ChatEvent`]s on the loop's channel. The loop hands every such event to
//! [`MessageSyncClient::handle_event`], so all state changes happen on one
//! thread. The poll timer is owned by the client: opening a conversation
//! replaces it and closing (or dropping) the client releases it.

use std::{
    sync::{mpsc::Sender, Arc},
    time::Duration,
};

use crate::{
    domain::{
        errors::{FetchError, SendError},
        events::ChatEvent,
        message::Message,
        message_sync::{
            MessagePage, MessageSyncState, PageKind, PageRequest, SendRequest, SyncChange,
            SyncPhase,
        },
        session::SessionContext,
        user::UserId,
    },
    usecases::{
        contracts::{PollHandle, PollScheduler, TaskDispatcher},
        load_messages::{load_messages, LoadMessagesQuery, MessagesSource},
        send_message::{send_message, MessageSender, SendMessageCommand},
    },
};

/// Everything the sync client needs from the server.
pub trait SyncApi: MessagesSource + MessageSender + Send + Sync {}

impl<T> SyncApi for T where T: MessagesSource + MessageSender + Send + Sync + ?Sized {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub poll_interval: Duration,
    pub refresh_delay: Duration,
    pub page_size: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(3_000),
            refresh_delay: Duration::from_millis(500),
            page_size: 20,
        }
    }
}

pub struct MessageSyncClient {
    state: MessageSyncState,
    session: SessionContext,
    settings: SyncSettings,
    api: Arc<dyn SyncApi>,
    dispatcher: Box<dyn TaskDispatcher>,
    scheduler: Box<dyn PollScheduler>,
    events: Sender<ChatEvent>,
    timer: Option<Box<dyn PollHandle>>,
}

impl std::fmt::Debug for MessageSyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSyncClient")
            .field("state", &self.state)
            .field("session", &self.session)
            .field("settings", &self.settings)
            .field("timer_active", &self.timer.is_some())
            .finish_non_exhaustive()
    }
}

impl MessageSyncClient {
    pub fn new(
        session: SessionContext,
        settings: SyncSettings,
        api: Arc<dyn SyncApi>,
        dispatcher: Box<dyn TaskDispatcher>,
        scheduler: Box<dyn PollScheduler>,
        events: Sender<ChatEvent>,
    ) -> Self {
        Self {
            state: MessageSyncState::with_page_size(settings.page_size),
            session,
            settings,
            api,
            dispatcher,
            scheduler,
            events,
            timer: None,
        }
    }

    pub fn state(&self) -> &MessageSyncState {
        &self.state
    }

    pub fn messages(&self) -> &[Message] {
        self.state.messages()
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    #[cfg(test)]
    pub fn is_polling(&self) -> bool {
        self.timer.is_some()
    }

    /// Replaces whatever conversation was open, requests page 1 and starts polling.
    pub fn open_conversation(&mut self, participant_id: UserId) {
        self.stop_timer();

        let request = self.state.open(participant_id);
        tracing::info!(
            participant_id = %request.participant_id,
            generation = request.generation,
            "conversation opened"
        );

        self.timer = Some(self.scheduler.start_polling(
            request.generation,
            self.settings.poll_interval,
            self.events.clone(),
        ));
        self.dispatch_fetch(request);
    }

    /// Returns `false` when nothing was requested: no more history, or a load is pending.
    pub fn load_older(&mut self) -> bool {
        match self.state.begin_load_older() {
            Some(request) => {
                self.dispatch_fetch(request);
                true
            }
            None => false,
        }
    }

    /// Returns `false` when the tick was dropped because a poll is still pending.
    pub fn poll(&mut self) -> bool {
        match self.state.begin_poll() {
            Some(request) => {
                self.dispatch_fetch(request);
                true
            }
            None => false,
        }
    }

    pub fn send(&mut self, text: &str) -> Result<(), SendError> {
        let request = self.state.begin_send(text)?;
        tracing::debug!(
            participant_id = %request.participant_id,
            chars = request.text.chars().count(),
            "send dispatched"
        );

        let api = Arc::clone(&self.api);
        let events = self.events.clone();
        let task_request = request.clone();
        let dispatched = self.dispatcher.dispatch(Box::new(move || {
            let command = SendMessageCommand {
                receiver_id: task_request.participant_id.clone(),
                text: task_request.text.clone(),
            };
            let result = send_message(&api.as_ref(), command);
            let _ = events.send(ChatEvent::SendCompleted {
                request: task_request,
                result,
            });
        }));

        if let Err(error) = dispatched {
            let _ = self.events.send(ChatEvent::SendCompleted {
                request,
                result: Err(SendError::Request(undispatched(&error))),
            });
        }

        Ok(())
    }

    /// Stops polling and forgets the conversation. Safe to call repeatedly.
    pub fn close_conversation(&mut self) -> bool {
        self.stop_timer();
        let closed = self.state.close();
        if closed {
            tracing::info!(generation = self.state.generation(), "conversation closed");
        }
        closed
    }

    /// Folds a loop event into the state. Input events are not sync events
    /// and leave the state untouched.
    pub fn handle_event(&mut self, event: ChatEvent) -> Result<SyncChange, SendError> {
        match event {
            ChatEvent::PollTick { generation } => {
                if generation == self.state.generation() {
                    self.poll();
                }
                Ok(SyncChange::Unchanged)
            }
            ChatEvent::RefreshDue { generation } => {
                if generation == self.state.generation() {
                    if let Some(request) = self.state.request_refresh() {
                        self.dispatch_fetch(request);
                    }
                }
                Ok(SyncChange::Unchanged)
            }
            ChatEvent::PageFetched { request, result } => Ok(self.apply_page(request, result)),
            ChatEvent::SendCompleted { request, result } => self.apply_send(&request, result),
            ChatEvent::Input(_) | ChatEvent::InputClosed => Ok(SyncChange::Unchanged),
        }
    }

    fn apply_page(
        &mut self,
        request: PageRequest,
        result: Result<MessagePage, FetchError>,
    ) -> SyncChange {
        let change = match request.kind {
            PageKind::Initial => self.state.apply_initial(&request, result),
            PageKind::Older => self.state.apply_older(&request, result),
            PageKind::Poll => self.state.apply_poll(&request, result),
        };

        match &change {
            SyncChange::Stale => {
                tracing::debug!(
                    generation = request.generation,
                    kind = ?request.kind,
                    "stale page result dropped"
                );
            }
            SyncChange::LoadFailed(error) => {
                tracing::warn!(error = %error, "initial message load failed");
            }
            SyncChange::OlderFailed(error) => {
                tracing::warn!(error = %error, page = request.page, "older history load failed");
            }
            SyncChange::PollFailed(error) => {
                tracing::warn!(
                    error = %error,
                    sequence = request.sequence,
                    "poll failed; waiting for next tick"
                );
            }
            _ => {}
        }

        if request.kind == PageKind::Poll {
            if let Some(refresh) = self.state.take_pending_refresh() {
                self.dispatch_fetch(refresh);
            }
        }

        change
    }

    fn apply_send(
        &mut self,
        request: &SendRequest,
        result: Result<Message, SendError>,
    ) -> Result<SyncChange, SendError> {
        if let Ok(message) = &result {
            if request.generation == self.state.generation()
                && self.session.learn_from_confirmed_send(message)
            {
                tracing::info!(
                    user_id = %message.sender_id,
                    "current user id learned from confirmed send"
                );
            }
        }

        let change = self.state.apply_send(request, result);
        match &change {
            Ok(SyncChange::Appended | SyncChange::Unchanged) => {
                if self.state.phase() == SyncPhase::Ready {
                    self.scheduler.schedule_refresh(
                        request.generation,
                        self.settings.refresh_delay,
                        self.events.clone(),
                    );
                }
            }
            Err(error) => tracing::warn!(error = %error, "send failed"),
            Ok(_) => {}
        }

        change
    }

    /// A request that could not be dispatched still completes, as a failure
    /// event on the loop's channel, so its in-flight guard is released.
    fn dispatch_fetch(&self, request: PageRequest) {
        let api = Arc::clone(&self.api);
        let events = self.events.clone();
        let task_request = request.clone();
        let dispatched = self.dispatcher.dispatch(Box::new(move || {
            let query = LoadMessagesQuery {
                participant_id: task_request.participant_id.clone(),
                page: task_request.page,
                limit: task_request.limit,
            };
            let result = load_messages(&api.as_ref(), query);
            let _ = events.send(ChatEvent::PageFetched {
                request: task_request,
                result,
            });
        }));

        if let Err(error) = dispatched {
            let _ = self.events.send(ChatEvent::PageFetched {
                request,
                result: Err(undispatched(&error)),
            });
        }
    }

    fn stop_timer(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
    }
}

fn undispatched(error: &std::io::Error) -> FetchError {
    FetchError::Network(format!("request not started: {error}"))
}

impl Drop for MessageSyncClient {
    fn drop(&mut self) {
        self.close_conversation();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc::{self, Receiver},
        Mutex,
    };

    use super::*;
    use crate::{
        domain::{
            errors::{SourceError, ValidationError},
            message::{DeliveryStatus, MessageId},
            session::AuthToken,
        },
        usecases::contracts::Task,
    };

    /// Holds dispatched tasks until the test runs them, in any order.
    /// While `refusing` is set, tasks are dropped as a failed spawn would.
    #[derive(Default, Clone)]
    struct QueuedDispatcher {
        tasks: Arc<Mutex<Vec<Task>>>,
        refusing: Arc<AtomicBool>,
    }

    impl QueuedDispatcher {
        fn pending(&self) -> usize {
            self.tasks.lock().expect("tasks lock").len()
        }

        fn run(&self, index: usize) {
            let task = self.tasks.lock().expect("tasks lock").remove(index);
            task();
        }

        fn run_all(&self) {
            while self.pending() > 0 {
                self.run(0);
            }
        }
    }

    impl TaskDispatcher for QueuedDispatcher {
        fn dispatch(&self, task: Task) -> std::io::Result<()> {
            if self.refusing.load(Ordering::SeqCst) {
                return Err(std::io::Error::other("thread limit reached"));
            }
            self.tasks.lock().expect("tasks lock").push(task);
            Ok(())
        }
    }

    #[derive(Default, Clone)]
    struct ManualScheduler {
        active: Arc<AtomicUsize>,
        started: Arc<AtomicUsize>,
        refreshes: Arc<Mutex<Vec<(u64, Duration)>>>,
    }

    struct ManualHandle {
        active: Arc<AtomicUsize>,
        stopped: bool,
    }

    impl PollHandle for ManualHandle {
        fn stop(&mut self) {
            if !self.stopped {
                self.stopped = true;
                self.active.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    impl Drop for ManualHandle {
        fn drop(&mut self) {
            self.stop();
        }
    }

    impl PollScheduler for ManualScheduler {
        fn start_polling(
            &self,
            _generation: u64,
            _interval: Duration,
            _events: Sender<ChatEvent>,
        ) -> Box<dyn PollHandle> {
            self.active.fetch_add(1, Ordering::SeqCst);
            self.started.fetch_add(1, Ordering::SeqCst);
            Box::new(ManualHandle {
                active: Arc::clone(&self.active),
                stopped: false,
            })
        }

        fn schedule_refresh(&self, generation: u64, delay: Duration, _events: Sender<ChatEvent>) {
            self.refreshes
                .lock()
                .expect("refreshes lock")
                .push((generation, delay));
        }
    }

    /// Answers page requests from a per-page script and records every call.
    #[derive(Default)]
    struct FakeApi {
        pages: Mutex<Vec<(UserId, u32, Result<MessagePage, SourceError>)>>,
        page_calls: Mutex<Vec<(UserId, u32)>>,
        send_result: Mutex<Option<Result<Message, SourceError>>>,
        send_calls: Mutex<Vec<(UserId, String)>>,
    }

    impl FakeApi {
        fn serve(&self, participant: &str, page: u32, result: Result<MessagePage, SourceError>) {
            self.pages
                .lock()
                .expect("pages lock")
                .push((UserId(participant.to_owned()), page, result));
        }

        fn page_calls(&self) -> Vec<(UserId, u32)> {
            self.page_calls.lock().expect("calls lock").clone()
        }

        fn send_calls(&self) -> usize {
            self.send_calls.lock().expect("calls lock").len()
        }
    }

    impl MessagesSource for FakeApi {
        fn fetch_page(
            &self,
            participant_id: &UserId,
            page: u32,
            _limit: u32,
        ) -> Result<MessagePage, SourceError> {
            self.page_calls
                .lock()
                .expect("calls lock")
                .push((participant_id.clone(), page));

            let mut pages = self.pages.lock().expect("pages lock");
            let position = pages
                .iter()
                .position(|(id, number, _)| id == participant_id && *number == page)
                .expect("unexpected page request");
            pages.remove(position).2
        }
    }

    impl MessageSender for FakeApi {
        fn send_text(&self, receiver_id: &UserId, text: &str) -> Result<Message, SourceError> {
            self.send_calls
                .lock()
                .expect("calls lock")
                .push((receiver_id.clone(), text.to_owned()));
            self.send_result
                .lock()
                .expect("send lock")
                .take()
                .expect("unexpected send")
        }
    }

    struct Harness {
        client: MessageSyncClient,
        api: Arc<FakeApi>,
        dispatcher: QueuedDispatcher,
        scheduler: ManualScheduler,
        events: Receiver<ChatEvent>,
    }

    impl Harness {
        fn new(user_id: Option<&str>) -> Self {
            let api = Arc::new(FakeApi::default());
            let dispatcher = QueuedDispatcher::default();
            let scheduler = ManualScheduler::default();
            let (tx, rx) = mpsc::channel();
            let client = MessageSyncClient::new(
                SessionContext::new(AuthToken::new("t"), user_id.map(|id| UserId(id.to_owned()))),
                SyncSettings::default(),
                api.clone(),
                Box::new(dispatcher.clone()),
                Box::new(scheduler.clone()),
                tx,
            );

            Self {
                client,
                api,
                dispatcher,
                scheduler,
                events: rx,
            }
        }

        /// Runs every queued task and feeds the resulting events to the client.
        fn settle(&mut self) -> Vec<Result<SyncChange, SendError>> {
            let mut changes = Vec::new();
            loop {
                self.dispatcher.run_all();
                let mut progressed = false;
                while let Ok(event) = self.events.try_recv() {
                    progressed = true;
                    changes.push(self.client.handle_event(event));
                }
                if !progressed && self.dispatcher.pending() == 0 {
                    return changes;
                }
            }
        }

        fn deliver_next(&mut self) -> Result<SyncChange, SendError> {
            let event = self.events.try_recv().expect("an event should be queued");
            self.client.handle_event(event)
        }

        fn ids(&self) -> Vec<&str> {
            self.client.messages().iter().map(|m| m.id.as_str()).collect()
        }
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

    fn page(messages: Vec<Message>, number: u32, has_more: bool) -> MessagePage {
        MessagePage {
            messages,
            page: number,
            has_more,
        }
    }

    #[test]
    fn open_loads_first_page_and_starts_one_timer() {
        let mut h = Harness::new(None);
        h.api.serve("42", 1, Ok(page(vec![msg("m1", 1), msg("m2", 2)], 1, false)));

        h.client.open_conversation(UserId("42".to_owned()));
        let changes = h.settle();

        assert_eq!(changes, vec![Ok(SyncChange::Loaded)]);
        assert_eq!(h.ids(), vec!["m1", "m2"]);
        assert_eq!(h.client.state().phase(), SyncPhase::Ready);
        assert_eq!(h.scheduler.active.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_initial_load_degrades_to_empty_ready_state() {
        let mut h = Harness::new(None);
        h.api.serve("42", 1, Err(SourceError::Network("offline".to_owned())));

        h.client.open_conversation(UserId("42".to_owned()));
        let changes = h.settle();

        assert_eq!(
            changes,
            vec![Ok(SyncChange::LoadFailed(FetchError::Network("offline".to_owned())))]
        );
        assert_eq!(h.client.state().phase(), SyncPhase::Ready);
        assert!(h.client.messages().is_empty());
    }

    #[test]
    fn switching_conversations_keeps_a_single_timer() {
        let mut h = Harness::new(None);
        h.api.serve("A", 1, Ok(page(vec![], 1, false)));
        h.api.serve("B", 1, Ok(page(vec![], 1, false)));

        h.client.open_conversation(UserId("A".to_owned()));
        h.client.open_conversation(UserId("B".to_owned()));

        assert_eq!(h.scheduler.started.load(Ordering::SeqCst), 2);
        assert_eq!(h.scheduler.active.load(Ordering::SeqCst), 1);
        h.settle();
    }

    #[test]
    fn late_result_for_previous_conversation_does_not_touch_current_one() {
        let mut h = Harness::new(None);
        h.api.serve("A", 1, Ok(page(vec![msg("a1", 1)], 1, false)));
        h.api.serve("B", 1, Ok(page(vec![msg("b1", 5)], 1, false)));

        h.client.open_conversation(UserId("A".to_owned()));
        h.client.open_conversation(UserId("B".to_owned()));

        h.dispatcher.run(1);
        assert_eq!(h.deliver_next(), Ok(SyncChange::Loaded));
        assert_eq!(h.ids(), vec!["b1"]);

        h.dispatcher.run(0);
        assert_eq!(h.deliver_next(), Ok(SyncChange::Stale));
        assert_eq!(h.ids(), vec!["b1"]);
    }

    #[test]
    fn load_older_twice_issues_one_request_for_page_two() {
        let mut h = Harness::new(None);
        h.api.serve("42", 1, Ok(page(vec![msg("m3", 3)], 1, true)));
        h.api.serve("42", 2, Ok(page(vec![msg("m1", 1), msg("m2", 2)], 2, false)));
        h.client.open_conversation(UserId("42".to_owned()));
        h.settle();

        assert!(h.client.load_older());
        assert!(!h.client.load_older());
        h.settle();

        let page_two_calls = h.api.page_calls().iter().filter(|(_, p)| *p == 2).count();
        assert_eq!(page_two_calls, 1);
        assert_eq!(h.ids(), vec!["m1", "m2", "m3"]);
        assert!(!h.client.load_older());
    }

    #[test]
    fn whitespace_send_issues_no_network_call() {
        let mut h = Harness::new(None);
        h.api.serve("42", 1, Ok(page(vec![msg("m1", 1)], 1, false)));
        h.client.open_conversation(UserId("42".to_owned()));
        h.settle();

        let result = h.client.send("   ");

        assert_eq!(result, Err(SendError::Validation(ValidationError::EmptyMessage)));
        assert_eq!(h.dispatcher.pending(), 0);
        assert_eq!(h.api.send_calls(), 0);
        assert_eq!(h.ids(), vec!["m1"]);
    }

    #[test]
    fn second_send_while_first_is_pending_is_rejected() {
        let mut h = Harness::new(None);
        h.api.serve("42", 1, Ok(page(vec![], 1, false)));
        h.client.open_conversation(UserId("42".to_owned()));
        h.settle();

        h.client.send("one").expect("first send should start");

        assert_eq!(h.client.send("two"), Err(SendError::AlreadySending));
        assert_eq!(h.dispatcher.pending(), 1);
    }

    #[test]
    fn confirmed_send_appends_learns_user_and_schedules_refresh() {
        let mut h = Harness::new(None);
        h.api.serve("42", 1, Ok(page(vec![msg("m1", 1)], 1, false)));
        h.client.open_conversation(UserId("42".to_owned()));
        h.settle();

        let mut own = msg("m2", 2);
        own.sender_id = UserId("me".to_owned());
        *h.api.send_result.lock().expect("send lock") = Some(Ok(own));

        h.client.send("hi").expect("send should start");
        let changes = h.settle();

        assert_eq!(changes, vec![Ok(SyncChange::Appended)]);
        assert_eq!(h.ids(), vec!["m1", "m2"]);
        assert_eq!(h.client.session().user_id, Some(UserId("me".to_owned())));
        let refreshes = h.scheduler.refreshes.lock().expect("refreshes lock").clone();
        assert_eq!(refreshes, vec![(h.client.state().generation(), Duration::from_millis(500))]);
    }

    #[test]
    fn failed_send_surfaces_error_and_leaves_sequence() {
        let mut h = Harness::new(Some("me"));
        h.api.serve("42", 1, Ok(page(vec![msg("m1", 1)], 1, false)));
        h.client.open_conversation(UserId("42".to_owned()));
        h.settle();
        *h.api.send_result.lock().expect("send lock") =
            Some(Err(SourceError::Network("reset".to_owned())));

        h.client.send("hi").expect("send should start");
        let changes = h.settle();

        assert_eq!(
            changes,
            vec![Err(SendError::Request(FetchError::Network("reset".to_owned())))]
        );
        assert_eq!(h.ids(), vec!["m1"]);
        assert_eq!(h.client.state().pending_send(), None);
        assert!(h.scheduler.refreshes.lock().expect("refreshes lock").is_empty());
    }

    #[test]
    fn send_then_shifted_poll_window_reconciles_without_duplicates() {
        let mut h = Harness::new(Some("me"));
        h.api.serve("42", 1, Ok(page(vec![msg("m1", 1), msg("m2", 2)], 1, false)));
        h.client.open_conversation(UserId("42".to_owned()));
        h.settle();

        *h.api.send_result.lock().expect("send lock") = Some(Ok(msg("m3", 3)));
        h.client.send("hi").expect("send should start");
        h.settle();

        h.api.serve(
            "42",
            1,
            Ok(page(vec![msg("m2", 2), msg("m3", 3), msg("m4", 4)], 1, false)),
        );
        let generation = h.client.state().generation();
        h.client
            .handle_event(ChatEvent::RefreshDue { generation })
            .expect("refresh should be accepted");
        let changes = h.settle();

        assert_eq!(changes, vec![Ok(SyncChange::Refreshed)]);
        assert_eq!(h.ids(), vec!["m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn overlapping_poll_ticks_issue_a_single_fetch() {
        let mut h = Harness::new(None);
        h.api.serve("42", 1, Ok(page(vec![msg("m1", 1)], 1, false)));
        h.client.open_conversation(UserId("42".to_owned()));
        h.settle();

        let generation = h.client.state().generation();
        h.api.serve("42", 1, Ok(page(vec![msg("m1", 1)], 1, false)));
        h.client
            .handle_event(ChatEvent::PollTick { generation })
            .expect("tick accepted");
        h.client
            .handle_event(ChatEvent::PollTick { generation })
            .expect("tick accepted");

        assert_eq!(h.dispatcher.pending(), 1);
        assert_eq!(h.settle(), vec![Ok(SyncChange::Unchanged)]);
    }

    #[test]
    fn refresh_during_poll_runs_after_it_completes() {
        let mut h = Harness::new(None);
        h.api.serve("42", 1, Ok(page(vec![msg("m1", 1)], 1, false)));
        h.client.open_conversation(UserId("42".to_owned()));
        h.settle();

        let generation = h.client.state().generation();
        h.api.serve("42", 1, Ok(page(vec![msg("m1", 1)], 1, false)));
        h.api.serve("42", 1, Ok(page(vec![msg("m1", 1), msg("m2", 2)], 1, false)));
        h.client
            .handle_event(ChatEvent::PollTick { generation })
            .expect("tick accepted");
        h.client
            .handle_event(ChatEvent::RefreshDue { generation })
            .expect("refresh accepted");
        assert_eq!(h.dispatcher.pending(), 1);

        let changes = h.settle();

        assert_eq!(
            changes,
            vec![Ok(SyncChange::Unchanged), Ok(SyncChange::Refreshed)]
        );
        assert_eq!(h.ids(), vec!["m1", "m2"]);
    }

    #[test]
    fn tick_for_previous_generation_is_ignored() {
        let mut h = Harness::new(None);
        h.api.serve("42", 1, Ok(page(vec![], 1, false)));
        h.client.open_conversation(UserId("42".to_owned()));
        h.settle();

        let stale_generation = h.client.state().generation() - 1;
        h.client
            .handle_event(ChatEvent::PollTick {
                generation: stale_generation,
            })
            .expect("tick accepted");

        assert_eq!(h.dispatcher.pending(), 0);
    }

    #[test]
    fn undispatched_requests_fail_and_release_their_guards() {
        let mut h = Harness::new(Some("me"));
        h.api.serve("42", 1, Ok(page(vec![msg("m1", 1)], 1, true)));
        h.client.open_conversation(UserId("42".to_owned()));
        h.settle();
        h.dispatcher.refusing.store(true, Ordering::SeqCst);

        assert!(h.client.poll());
        assert!(h.client.load_older());
        h.client.send("hi").expect("send should start");
        let changes = h.settle();

        assert_eq!(changes.len(), 3);
        assert!(matches!(
            changes[0],
            Ok(SyncChange::PollFailed(FetchError::Network(_)))
        ));
        assert!(matches!(
            changes[1],
            Ok(SyncChange::OlderFailed(FetchError::Network(_)))
        ));
        assert!(matches!(
            changes[2],
            Err(SendError::Request(FetchError::Network(_)))
        ));
        assert_eq!(h.ids(), vec!["m1"]);
        assert_eq!(h.client.state().pending_send(), None);
        assert!(!h.client.state().is_loading_older());

        h.dispatcher.refusing.store(false, Ordering::SeqCst);
        assert!(h.client.poll());
        assert!(h.client.load_older());
        assert_eq!(h.dispatcher.pending(), 2);
        assert_eq!(h.api.send_calls(), 0);
    }

    #[test]
    fn failed_poll_is_not_fatal() {
        let mut h = Harness::new(None);
        h.api.serve("42", 1, Ok(page(vec![msg("m1", 1)], 1, false)));
        h.client.open_conversation(UserId("42".to_owned()));
        h.settle();

        h.api.serve("42", 1, Err(SourceError::Network("timeout".to_owned())));
        assert!(h.client.poll());
        let changes = h.settle();

        assert!(matches!(changes.as_slice(), [Ok(SyncChange::PollFailed(_))]));
        assert_eq!(h.ids(), vec!["m1"]);
        assert!(h.client.is_polling());
    }

    #[test]
    fn close_releases_timer_and_is_idempotent() {
        let mut h = Harness::new(None);
        h.api.serve("42", 1, Ok(page(vec![], 1, false)));
        h.client.open_conversation(UserId("42".to_owned()));
        h.settle();

        assert!(h.client.close_conversation());
        assert!(!h.client.close_conversation());
        assert!(!h.client.is_polling());
        assert_eq!(h.scheduler.active.load(Ordering::SeqCst), 0);
        assert_eq!(h.client.state().phase(), SyncPhase::Closed);
    }

    #[test]
    fn dropping_the_client_releases_the_timer() {
        let h = Harness::new(None);
        let Harness {
            mut client,
            scheduler,
            ..
        } = h;
        client.open_conversation(UserId("42".to_owned()));
        assert_eq!(scheduler.active.load(Ordering::SeqCst), 1);

        drop(client);

        assert_eq!(scheduler.active.load(Ordering::SeqCst), 0);
    }
}
