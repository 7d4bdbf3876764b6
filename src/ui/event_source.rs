use std::{
    io::{self, BufRead},
    sync::mpsc::Sender,
    thread,
};

use crate::domain::events::ChatEvent;

const STDIN_READ_FAILED: &str = "UI_STDIN_READ_FAILED";

/// Forwards stdin lines to the chat loop on a background thread.
pub fn spawn_stdin_reader(events: Sender<ChatEvent>) -> io::Result<()> {
    thread::Builder::new()
        .name("convoo-stdin".to_owned())
        .spawn(move || pump_lines(io::stdin().lock(), &events))
        .map(|_| ())
}

/// Sends every line as `ChatEvent::Input`, then `InputClosed` on EOF or a
/// read error. Stops early once the loop has gone away.
pub fn pump_lines<R: BufRead>(reader: R, events: &Sender<ChatEvent>) {
    for line in reader.lines() {
        match line {
            Ok(line) => {
                if events.send(ChatEvent::Input(line)).is_err() {
                    return;
                }
            }
            Err(error) => {
                tracing::warn!(code = STDIN_READ_FAILED, error = %error, "stdin read failed");
                break;
            }
        }
    }

    let _ = events.send(ChatEvent::InputClosed);
}
