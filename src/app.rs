use std::{
    io::{self, Write},
    sync::{mpsc, Arc},
    time::Duration,
};

use anyhow::{bail, Result};

use crate::{
    api,
    cli::{ChatTarget, Cli, Command},
    domain::{
        self,
        conversation::{resolve_conversation, Conversation},
        user::{User, UserId},
    },
    infra::{
        self, config::SyncConfig, dispatch::ThreadDispatcher, error::AppError,
        poll_timer::TokioPollScheduler, session_store::SessionStore,
        storage_layout::StorageLayout,
    },
    ui,
    usecases::{
        self, bootstrap,
        context::AppContext,
        guided_auth::{run_guided_auth, GuidedAuthOutcome, RetryPolicy, StdTerminal},
        list_conversations::list_conversations,
        logout::logout,
        message_sync::{MessageSyncClient, SyncSettings},
        search_users::{normalize_phone_query, pick_user, search_users},
    },
};

const SESSION_SAVE_FAILED: &str = "SESSION_SAVE_FAILED";

pub fn run(cli: Cli) -> Result<()> {
    tracing::debug!(
        ui = ui::module_name(),
        domain = domain::module_name(),
        api = api::module_name(),
        usecases = usecases::module_name(),
        infra = infra::module_name(),
        "module boundaries loaded"
    );

    match cli.command_or_default() {
        Command::Login => {
            let context = bootstrap::bootstrap(cli.config.as_deref())?;
            let api = context.api(None)?;

            let outcome = run_guided_auth(&mut StdTerminal, &api, &RetryPolicy::default())?;
            match outcome {
                GuidedAuthOutcome::Authenticated(session) => {
                    context.sessions.save(&session)?;
                    tracing::info!(
                        session_file = %context.sessions.path().display(),
                        "session saved"
                    );
                    println!("Session saved. Run `convoo` to see your conversations.");
                }
                GuidedAuthOutcome::ExitWithGuidance => {
                    tracing::info!("login ended without a session");
                }
            }
        }
        Command::Logout => {
            let context = bootstrap::bootstrap(cli.config.as_deref());
            let sessions = logout_store(&context)?;
            let outcome = logout(&sessions)?;
            tracing::info!(session_removed = outcome.session_removed, "logout completed");
            println!("{}", logout_message(outcome.session_removed));
        }
        Command::Conversations => {
            let context = bootstrap::bootstrap(cli.config.as_deref())?;
            let session = context.require_session()?;
            let api = context.api(Some(&session))?;

            let output = list_conversations(&api)?;
            let now_ms = chrono::Utc::now().timestamp_millis();
            print_lines(&ui::view::conversation_lines(&output.conversations, now_ms))?;
        }
        Command::Search { phone } => {
            let context = bootstrap::bootstrap(cli.config.as_deref())?;
            let session = context.require_session()?;
            let api = context.api(Some(&session))?;

            let users = search_users(&api, &phone)?;
            print_lines(&ui::view::user_lines(&users))?;
        }
        Command::Chat(target) => {
            let context = bootstrap::bootstrap(cli.config.as_deref())?;
            run_chat_command(&context, &target)?;
        }
    }

    Ok(())
}

fn run_chat_command(context: &AppContext, target: &ChatTarget) -> Result<()> {
    let session = context.require_session()?;
    let api = context.api(Some(&session))?;

    let known = list_conversations(&api)?.conversations;
    let conversation = match (&target.participant_id, &target.phone) {
        (Some(id), _) => conversation_by_participant(&known, id)?,
        (None, Some(phone)) => {
            let digits = normalize_phone_query(phone)?;
            let users = search_users(&api, &digits)?;
            let Some(user) = pick_user(&users, &digits) else {
                print_lines(&no_unique_match_lines(&users))?;
                return Ok(());
            };
            resolve_conversation(&known, user)
        }
        (None, None) => bail!("chat needs a participant id or --phone"),
    };

    let Some(participant) = conversation.counterpart().cloned() else {
        bail!("conversation has no participant to chat with");
    };
    tracing::info!(
        participant_id = %participant.id,
        existing = conversation.id.is_some(),
        "conversation resolved"
    );

    let (events_tx, events_rx) = mpsc::channel();
    ui::event_source::spawn_stdin_reader(events_tx.clone())?;

    let mut client = MessageSyncClient::new(
        session.clone(),
        sync_settings(&context.config.sync),
        Arc::new(api),
        Box::new(ThreadDispatcher),
        Box::new(TokioPollScheduler::new(context.runtime.handle().clone())),
        events_tx,
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = ui::shell::run_chat(&mut client, participant, &events_rx, &mut out);

    if client.session().user_id != session.user_id {
        if let Err(error) = context.sessions.save(client.session()) {
            tracing::warn!(
                code = SESSION_SAVE_FAILED,
                error = %error,
                "learned user id could not be saved"
            );
        }
    }

    result
}

/// Participant ids only resolve against known conversations; new chats start by phone.
fn conversation_by_participant(known: &[Conversation], id: &str) -> Result<Conversation> {
    let id = UserId(id.trim().to_owned());
    match known.iter().find(|conversation| conversation.has_participant(&id)) {
        Some(conversation) => Ok(conversation.clone()),
        None => bail!(
            "no conversation with participant {id}; start one with `convoo chat --phone <number>`"
        ),
    }
}

fn no_unique_match_lines(users: &[User]) -> Vec<String> {
    if users.is_empty() {
        return vec!["No user found with that phone number.".to_owned()];
    }

    let mut lines = vec!["Several users match; use the full phone number:".to_owned()];
    lines.extend(ui::view::user_lines(users));
    lines
}

fn sync_settings(config: &SyncConfig) -> SyncSettings {
    SyncSettings {
        poll_interval: Duration::from_millis(config.poll_interval_ms),
        refresh_delay: Duration::from_millis(config.refresh_delay_ms),
        page_size: config.page_size,
    }
}

/// Logout must work even when the config file is broken, so only the storage
/// layout is resolved here.
fn logout_store(context: &Result<AppContext, AppError>) -> Result<SessionStore> {
    match context {
        Ok(context) => Ok(context.sessions.clone()),
        Err(error) => {
            tracing::warn!(
                error = ?error,
                "logout fallback: bootstrap failed, continuing with local cleanup"
            );
            let layout = StorageLayout::resolve()?;
            Ok(SessionStore::new(layout.session_file()))
        }
    }
}

fn logout_message(session_removed: bool) -> &'static str {
    if session_removed {
        "Logged out. Run `convoo login` to sign in again."
    } else {
        "No saved session; nothing to do."
    }
}

fn print_lines(lines: &[String]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use std::{env, fs};

    use super::*;
    use crate::{
        domain::conversation::{ConversationId, ConversationType},
        test_support::env_lock,
    };

    fn user(id: &str, phone: &str) -> User {
        User {
            id: UserId(id.to_owned()),
            phone: phone.to_owned(),
            name: Some(format!("User {id}")),
        }
    }

    #[test]
    fn sync_settings_follow_config() {
        let settings = sync_settings(&SyncConfig {
            poll_interval_ms: 1_500,
            page_size: 50,
            refresh_delay_ms: 250,
        });

        assert_eq!(settings.poll_interval, Duration::from_millis(1_500));
        assert_eq!(settings.refresh_delay, Duration::from_millis(250));
        assert_eq!(settings.page_size, 50);
    }

    #[test]
    fn participant_id_resolves_known_conversation() {
        let known = vec![Conversation {
            id: Some(ConversationId("c1".to_owned())),
            participants: vec![user("42", "9876543210")],
            last_message: None,
            kind: ConversationType::Direct,
        }];

        let conversation = conversation_by_participant(&known, " 42 ").expect("known participant");

        assert_eq!(conversation.id, Some(ConversationId("c1".to_owned())));
    }

    #[test]
    fn unknown_participant_id_points_to_phone_flow() {
        let error = conversation_by_participant(&[], "42").expect_err("unknown participant");

        assert!(error.to_string().contains("--phone"));
    }

    #[test]
    fn ambiguous_search_lists_candidates() {
        let lines = no_unique_match_lines(&[user("1", "9000000001"), user("2", "9000000002")]);

        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("full phone number"));
        assert!(no_unique_match_lines(&[])[0].contains("No user found"));
    }

    #[test]
    fn logout_message_depends_on_removal() {
        assert!(logout_message(true).contains("Logged out"));
        assert!(logout_message(false).contains("nothing to do"));
    }

    #[test]
    fn logout_cleans_session_even_when_config_is_invalid() {
        let _guard = env_lock();
        let root = tempfile::tempdir().expect("temp dir");
        let xdg = root.path().join("xdg");
        fs::create_dir_all(&xdg).expect("xdg dir should be creatable");

        let old_xdg = env::var_os("XDG_CONFIG_HOME");
        // SAFETY: env is guarded by process-wide test mutex.
        unsafe { env::set_var("XDG_CONFIG_HOME", &xdg) };

        let config_path = root.path().join("invalid-config.toml");
        fs::write(&config_path, "[sync]\npoll_interval_ms = 0\n")
            .expect("invalid config fixture should be writable");

        let layout = StorageLayout::resolve().expect("layout");
        layout.ensure_dirs().expect("layout dirs should be created");
        fs::write(layout.session_file(), "token = \"t\"\n").expect("session should be written");

        let cli = Cli {
            config: Some(config_path),
            command: Some(Command::Logout),
        };

        let result = run(cli);

        match old_xdg {
            Some(value) => {
                // SAFETY: restoring env while guard is held.
                unsafe { env::set_var("XDG_CONFIG_HOME", value) }
            }
            None => {
                // SAFETY: restoring env while guard is held.
                unsafe { env::remove_var("XDG_CONFIG_HOME") }
            }
        }

        result.expect("logout should succeed despite bootstrap failure");
        assert!(!layout.session_file().exists());
    }
}
