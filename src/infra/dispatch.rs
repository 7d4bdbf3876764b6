use std::{io, thread};

use crate::usecases::contracts::{Task, TaskDispatcher};

const DISPATCH_SPAWN_FAILED: &str = "SYNC_DISPATCH_SPAWN_FAILED";

/// One short-lived thread per request. The API adapter blocks on its own
/// runtime, so tasks must not run on runtime worker threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDispatcher;

impl TaskDispatcher for ThreadDispatcher {
    fn dispatch(&self, task: Task) -> io::Result<()> {
        thread::Builder::new()
            .name("convoo-request".to_owned())
            .spawn(task)
            .map(drop)
            .inspect_err(|error| {
                tracing::error!(
                    code = DISPATCH_SPAWN_FAILED,
                    error = %error,
                    "failed to spawn request thread"
                );
            })
    }
}
