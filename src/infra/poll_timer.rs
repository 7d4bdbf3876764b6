use std::{sync::mpsc::Sender, time::Duration};

use tokio::{
    runtime::Handle,
    sync::watch,
    time::{self, MissedTickBehavior},
};

use crate::{
    domain::events::ChatEvent,
    usecases::contracts::{PollHandle, PollScheduler},
};

const POLL_TIMER_STARTED: &str = "SYNC_POLL_TIMER_STARTED";
const POLL_TIMER_STOPPED: &str = "SYNC_POLL_TIMER_STOPPED";
const POLL_TIMER_RECEIVER_GONE: &str = "SYNC_POLL_TIMER_RECEIVER_GONE";

#[derive(Debug)]
pub struct PollTimer {
    stop_tx: Option<watch::Sender<bool>>,
}

impl PollTimer {
    #[cfg(test)]
    pub fn inert() -> Self {
        Self { stop_tx: None }
    }
}

impl PollHandle for PollTimer {
    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
            tracing::debug!(code = POLL_TIMER_STOPPED, "poll timer stop signal sent");
        }
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Tick and refresh timers on a shared tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioPollScheduler {
    handle: Handle,
}

impl TokioPollScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl PollScheduler for TokioPollScheduler {
    fn start_polling(
        &self,
        generation: u64,
        interval: Duration,
        events: Sender<ChatEvent>,
    ) -> Box<dyn PollHandle> {
        let (stop_tx, stop_rx) = watch::channel(false);
        self.handle
            .spawn(run_ticks(generation, interval, events, stop_rx));

        tracing::debug!(
            code = POLL_TIMER_STARTED,
            generation,
            interval_ms = interval.as_millis() as u64,
            "poll timer started"
        );

        Box::new(PollTimer {
            stop_tx: Some(stop_tx),
        })
    }

    fn schedule_refresh(&self, generation: u64, delay: Duration, events: Sender<ChatEvent>) {
        self.handle.spawn(async move {
            time::sleep(delay).await;
            let _ = events.send(ChatEvent::RefreshDue { generation });
        });
    }
}

async fn run_ticks(
    generation: u64,
    period: Duration,
    events: Sender<ChatEvent>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    tracing::debug!(code = POLL_TIMER_STOPPED, generation, "poll timer stopped");
                    return;
                }
            }
            _ = ticker.tick() => {
                if events.send(ChatEvent::PollTick { generation }).is_err() {
                    tracing::debug!(
                        code = POLL_TIMER_RECEIVER_GONE,
                        generation,
                        "chat loop gone; poll timer exiting"
                    );
                    return;
                }
            }
        }
    }
}
