use std::{io::Write, sync::mpsc::Receiver};

use anyhow::Result;

use crate::{
    domain::{errors::SendError, events::ChatEvent, user::User},
    usecases::message_sync::MessageSyncClient,
};

use super::{
    commands::{parse_command, ChatCommand, HELP_LINES},
    view::ChatView,
};

/// Runs the chat loop until `/quit` or end of input. At end of input a send
/// still in flight is awaited first. The conversation is closed on every exit
/// path, including write errors.
pub fn run_chat<W: Write>(
    client: &mut MessageSyncClient,
    participant: User,
    events: &Receiver<ChatEvent>,
    out: &mut W,
) -> Result<()> {
    tracing::info!(participant_id = %participant.id, "starting chat shell");

    let result = chat_loop(client, participant, events, out);
    client.close_conversation();
    result
}

fn chat_loop<W: Write>(
    client: &mut MessageSyncClient,
    participant: User,
    events: &Receiver<ChatEvent>,
    out: &mut W,
) -> Result<()> {
    let mut view = ChatView::new(participant.clone());
    write_lines(out, &view.header_lines())?;
    client.open_conversation(participant.id);

    let mut input_closed = false;
    while let Ok(event) = events.recv() {
        match event {
            ChatEvent::Input(line) => {
                if !handle_input(client, &line, out)? {
                    break;
                }
            }
            ChatEvent::InputClosed => input_closed = true,
            event => {
                let lines = match client.handle_event(event) {
                    Ok(change) => view.on_change(
                        &change,
                        client.messages(),
                        client.state().cursor().has_more,
                        client.session(),
                    ),
                    Err(error) => vec![format!("Message not sent: {error}")],
                };
                write_lines(out, &lines)?;
            }
        }

        if input_closed && client.state().pending_send().is_none() {
            break;
        }
    }

    Ok(())
}

/// Returns `false` when the user asked to leave.
fn handle_input<W: Write>(client: &mut MessageSyncClient, line: &str, out: &mut W) -> Result<bool> {
    match parse_command(line) {
        ChatCommand::Send(text) => match client.send(&text) {
            Ok(()) => write_lines(out, &["sending…".to_owned()])?,
            Err(SendError::Validation(_)) => {}
            Err(SendError::AlreadySending) => {
                write_lines(out, &["Still sending the previous message.".to_owned()])?
            }
            Err(error) => write_lines(out, &[format!("Message not sent: {error}")])?,
        },
        ChatCommand::LoadOlder => {
            if !client.load_older() {
                let line = if client.state().is_loading_older() {
                    "Already loading older messages."
                } else {
                    "No older messages."
                };
                write_lines(out, &[line.to_owned()])?;
            }
        }
        ChatCommand::Help => {
            let lines: Vec<String> = HELP_LINES.iter().map(|line| (*line).to_owned()).collect();
            write_lines(out, &lines)?;
        }
        ChatCommand::Quit => return Ok(false),
        ChatCommand::Nothing => {}
        ChatCommand::Unknown(command) => {
            write_lines(out, &[format!("Unknown command {command}. Type /help.")])?
        }
    }

    Ok(true)
}

fn write_lines<W: Write>(out: &mut W, lines: &[String]) -> Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            mpsc::{self, Sender},
            Arc, Mutex,
        },
        time::Duration,
    };

    use super::*;
    use crate::{
        domain::{
            errors::SourceError,
            message::{DeliveryStatus, Message, MessageId},
            message_sync::MessagePage,
            session::{AuthToken, SessionContext},
            user::UserId,
        },
        usecases::{
            contracts::{PollHandle, PollScheduler, Task, TaskDispatcher},
            load_messages::MessagesSource,
            message_sync::SyncSettings,
            send_message::MessageSender,
        },
    };

    /// Runs tasks immediately. Typed input is released after the first task
    /// so it arrives once the initial page is queued, as it would interactively.
    struct InlineDispatcher {
        typed: Mutex<Option<(Sender<ChatEvent>, Vec<ChatEvent>)>>,
    }

    impl TaskDispatcher for InlineDispatcher {
        fn dispatch(&self, task: Task) -> std::io::Result<()> {
            task();
            if let Some((tx, typed)) = self.typed.lock().expect("typed lock").take() {
                for event in typed {
                    tx.send(event).expect("queue input");
                }
            }
            Ok(())
        }
    }

    struct IdleHandle;

    impl PollHandle for IdleHandle {
        fn stop(&mut self) {}
    }

    #[derive(Clone, Default)]
    struct NoTicks {
        refreshes: Arc<Mutex<usize>>,
    }

    impl PollScheduler for NoTicks {
        fn start_polling(
            &self,
            _generation: u64,
            _interval: Duration,
            _events: Sender<ChatEvent>,
        ) -> Box<dyn PollHandle> {
            Box::new(IdleHandle)
        }

        fn schedule_refresh(&self, _generation: u64, _delay: Duration, _events: Sender<ChatEvent>) {
            *self.refreshes.lock().expect("refreshes lock") += 1;
        }
    }

    #[derive(Default)]
    struct ScriptedApi {
        history: Vec<Message>,
        sent: Mutex<Vec<String>>,
    }

    impl MessagesSource for ScriptedApi {
        fn fetch_page(
            &self,
            _participant_id: &UserId,
            page: u32,
            _limit: u32,
        ) -> Result<MessagePage, SourceError> {
            Ok(MessagePage {
                messages: if page == 1 { self.history.clone() } else { vec![] },
                page,
                has_more: false,
            })
        }
    }

    impl MessageSender for ScriptedApi {
        fn send_text(&self, _receiver_id: &UserId, text: &str) -> Result<Message, SourceError> {
            let mut sent = self.sent.lock().expect("sent lock");
            sent.push(text.to_owned());
            Ok(Message {
                id: MessageId(format!("s{}", sent.len())),
                sender_id: UserId("me".to_owned()),
                text: text.to_owned(),
                created_at_ms: 1_771_000_000_000 + 60_000 * sent.len() as i64,
                status: DeliveryStatus::Sent,
                attachments: vec![],
            })
        }
    }

    fn participant() -> User {
        User {
            id: UserId("42".to_owned()),
            phone: "9876543210".to_owned(),
            name: Some("Asha".to_owned()),
        }
    }

    fn run(api: Arc<ScriptedApi>, inputs: &[&str]) -> (String, NoTicks) {
        let (tx, rx) = mpsc::channel();
        let scheduler = NoTicks::default();
        let mut typed: Vec<ChatEvent> = inputs
            .iter()
            .map(|input| ChatEvent::Input((*input).to_owned()))
            .collect();
        typed.push(ChatEvent::InputClosed);
        let dispatcher = InlineDispatcher {
            typed: Mutex::new(Some((tx.clone(), typed))),
        };
        let mut client = MessageSyncClient::new(
            SessionContext::new(AuthToken::new("t"), Some(UserId("me".to_owned()))),
            SyncSettings::default(),
            api,
            Box::new(dispatcher),
            Box::new(scheduler.clone()),
            tx,
        );

        let mut out = Vec::new();
        run_chat(&mut client, participant(), &rx, &mut out).expect("chat should run");

        assert_eq!(client.state().phase(), crate::domain::message_sync::SyncPhase::Closed);
        (String::from_utf8(out).expect("utf8 output"), scheduler)
    }

    #[test]
    fn help_and_unknown_commands_are_answered() {
        let (output, _) = run(Arc::new(ScriptedApi::default()), &["/help", "/nope"]);

        assert!(output.contains("Chat with Asha"));
        assert!(output.contains("/more  load older messages"));
        assert!(output.contains("Unknown command /nope"));
    }

    #[test]
    fn quit_stops_before_later_input() {
        let api = Arc::new(ScriptedApi::default());

        let (output, _) = run(api.clone(), &["/quit", "after quit"]);

        assert!(!output.contains("sending"));
        assert!(api.sent.lock().expect("sent lock").is_empty());
    }

    #[test]
    fn blank_lines_send_nothing() {
        let api = Arc::new(ScriptedApi::default());

        let (output, _) = run(api.clone(), &["   ", ""]);

        assert!(!output.contains("sending"));
        assert!(api.sent.lock().expect("sent lock").is_empty());
    }

    #[test]
    fn typed_text_is_sent_and_echoed_after_confirmation() {
        let api = Arc::new(ScriptedApi::default());

        let (output, scheduler) = run(api.clone(), &["hello"]);

        assert_eq!(*api.sent.lock().expect("sent lock"), vec!["hello".to_owned()]);
        assert!(output.contains("sending…"));
        assert!(output.contains("You:"));
        assert!(output.contains("hello ✓"));
        assert_eq!(*scheduler.refreshes.lock().expect("refreshes lock"), 1);
    }

    #[test]
    fn history_is_printed_on_open() {
        let api = Arc::new(ScriptedApi {
            history: vec![Message {
                id: MessageId("m1".to_owned()),
                sender_id: UserId("42".to_owned()),
                text: "welcome".to_owned(),
                created_at_ms: 1_771_000_000_000,
                status: DeliveryStatus::Read,
                attachments: vec![],
            }],
            ..ScriptedApi::default()
        });

        let (output, _) = run(api, &[]);

        assert!(output.contains("Asha:"));
        assert!(output.contains("welcome"));
        assert!(!output.contains("welcome ✓"));
    }

    #[test]
    fn more_without_history_reports_it() {
        let (output, _) = run(Arc::new(ScriptedApi::default()), &["/more"]);

        assert!(output.contains("No older messages."));
    }
}
