use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "convoo", about = "Terminal client for Convoo messaging")]
pub struct Cli {
    /// Path to config file (default: ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Sign in with phone number and one-time code
    Login,
    /// Forget the saved session
    Logout,
    /// List conversations (default)
    Conversations,
    /// Find users by phone number
    Search {
        /// Full or partial phone number
        phone: String,
    },
    /// Open a conversation
    Chat(ChatTarget),
}

#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct ChatTarget {
    /// Id of the other participant
    pub participant_id: Option<String>,

    /// Phone number of the other participant
    #[arg(long)]
    pub phone: Option<String>,
}

impl Cli {
    pub fn command_or_default(&self) -> Command {
        self.command.clone().unwrap_or(Command::Conversations)
    }
}
