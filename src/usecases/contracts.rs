use std::{io, sync::mpsc::Sender, time::Duration};

use crate::domain::events::ChatEvent;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs blocking network work off the chat loop.
pub trait TaskDispatcher {
    /// On error the task was dropped without running.
    fn dispatch(&self, task: Task) -> io::Result<()>;
}

/// Releases its timer when stopped or dropped.
pub trait PollHandle: Send {
    fn stop(&mut self);
}

pub trait PollScheduler {
    /// Emits `ChatEvent::PollTick { generation }` every `interval` until the
    /// returned handle is stopped.
    fn start_polling(
        &self,
        generation: u64,
        interval: Duration,
        events: Sender<ChatEvent>,
    ) -> Box<dyn PollHandle>;

    /// Emits a single `ChatEvent::RefreshDue { generation }` after `delay`.
    fn schedule_refresh(&self, generation: u64, delay: Duration, events: Sender<ChatEvent>);
}
