//! Bot command handlers
//!
//! Registration flows driven by chat commands. Failures are answered with a
//! fixed, generic reply; the underlying error only goes to the log.

use std::sync::Arc;

use super::types::Update;
use super::BotTransport;
use crate::error::{RelayError, Result};
use crate::model::User;
use crate::repository::{UserReader, UserStore, UserWriter};

pub const REPLY_UNAUTHORIZED: &str = "unauthorized to use command";
pub const REPLY_INSUFFICIENT_ARGUMENTS: &str = "insufficient arguments";
pub const REPLY_BAD_CHAT_ID: &str = "could not parse chat ID";
pub const REPLY_CLEANUP_FAILED: &str = "error when cleaning up the database by telegram chat ID";
pub const REPLY_CREATE_FAILED: &str = "error when creating user";
pub const REPLY_DELETE_FAILED: &str = "an error occurred when trying to delete users";
pub const REPLY_LIST_FAILED: &str = "an error occurred when trying to get all users";

/// A recognised chat command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Stop,
    GetAllUsers,
    AddUser { args: Vec<&'a str> },
}

/// Parse the first word of `text` as a command.
///
/// `/cmd@botname` is accepted as `/cmd`. Anything else is `None`.
pub fn parse_command(text: &str) -> Option<Command<'_>> {
    let mut words = text.split_whitespace();
    let head = words.next()?;
    let name = head.split('@').next().unwrap_or(head);

    match name {
        "/start" => Some(Command::Start),
        "/stop" => Some(Command::Stop),
        "/getAllUsers" => Some(Command::GetAllUsers),
        "/addUser" => Some(Command::AddUser {
            args: words.collect(),
        }),
        _ => None,
    }
}

/// Error path of a command: what the chat is told, and what is logged
struct Failure {
    reply: &'static str,
    error: RelayError,
}

impl Failure {
    fn new(reply: &'static str, error: RelayError) -> Self {
        Self { reply, error }
    }
}

pub struct CommandHandler {
    users: Arc<dyn UserStore>,
    transport: Arc<dyn BotTransport>,
    superuser_chat_id: i64,
}

impl CommandHandler {
    pub fn new(
        users: Arc<dyn UserStore>,
        transport: Arc<dyn BotTransport>,
        superuser_chat_id: i64,
    ) -> Self {
        Self {
            users,
            transport,
            superuser_chat_id,
        }
    }

    /// Handle one update. Updates without a text message are skipped.
    pub fn handle_update(&self, update: &Update) -> Result<()> {
        let Some(message) = &update.message else {
            return Ok(());
        };
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };

        tracing::debug!(
            chat_id = message.chat.id,
            username = message.from.as_ref().and_then(|f| f.username.as_deref()),
            text,
            "bot message received"
        );

        self.handle(message.chat.id, text)
    }

    /// Run the command in `text` on behalf of `chat_id` and reply
    pub fn handle(&self, chat_id: i64, text: &str) -> Result<()> {
        let Some(command) = parse_command(text) else {
            return Ok(());
        };

        match self.execute(chat_id, &command) {
            Ok(reply) => self.transport.send_message(chat_id, &reply),
            Err(failure) => {
                tracing::error!(
                    chat_id,
                    command = ?command,
                    error = %failure.error,
                    "{}",
                    failure.reply
                );
                if let Err(e) = self.transport.send_message(chat_id, failure.reply) {
                    tracing::error!(chat_id, error = %e, "could not send error reply");
                }
                Err(failure.error)
            }
        }
    }

    fn execute(&self, chat_id: i64, command: &Command<'_>) -> std::result::Result<String, Failure> {
        match command {
            Command::Start => self.start(chat_id),
            Command::Stop => self.stop(chat_id),
            Command::GetAllUsers => {
                self.require_superuser(chat_id)?;
                self.get_all_users()
            }
            Command::AddUser { args } => {
                self.require_superuser(chat_id)?;
                self.add_user(args)
            }
        }
    }

    fn require_superuser(&self, chat_id: i64) -> std::result::Result<(), Failure> {
        if self.superuser_chat_id != 0 && chat_id == self.superuser_chat_id {
            Ok(())
        } else {
            Err(Failure::new(REPLY_UNAUTHORIZED, RelayError::Unauthorized))
        }
    }

    /// Replace whatever this chat had with one fresh user
    fn register(&self, chat_id: i64) -> std::result::Result<User, Failure> {
        self.users
            .delete_all_by_external_chat_id(chat_id)
            .map_err(|e| Failure::new(REPLY_CLEANUP_FAILED, e))?;

        let user = User::register(chat_id);
        self.users
            .create(&user)
            .map_err(|e| Failure::new(REPLY_CREATE_FAILED, e))?;

        tracing::info!(chat_id, user_id = %user.id, "user registered");
        Ok(user)
    }

    fn start(&self, chat_id: i64) -> std::result::Result<String, Failure> {
        let user = self.register(chat_id)?;
        Ok(format!("Welcome!\nYour ID is {}", user.id))
    }

    fn stop(&self, chat_id: i64) -> std::result::Result<String, Failure> {
        self.users
            .delete_all_by_external_chat_id(chat_id)
            .map_err(|e| Failure::new(REPLY_DELETE_FAILED, e))?;

        tracing::info!(chat_id, "chat unregistered");
        Ok(format!(
            "Bye!\nChat ID {} has been removed from the system.",
            chat_id
        ))
    }

    fn get_all_users(&self) -> std::result::Result<String, Failure> {
        let users = self
            .users
            .get_all()
            .map_err(|e| Failure::new(REPLY_LIST_FAILED, e))?;

        serde_json::to_string_pretty(&users).map_err(|e| {
            Failure::new(REPLY_LIST_FAILED, RelayError::Serialization(e.to_string()))
        })
    }

    fn add_user(&self, args: &[&str]) -> std::result::Result<String, Failure> {
        let raw = args.first().ok_or_else(|| {
            Failure::new(
                REPLY_INSUFFICIENT_ARGUMENTS,
                RelayError::InvalidArguments("chat ID missing".to_string()),
            )
        })?;

        let chat_id = match raw.parse::<i64>() {
            Ok(id) if id != 0 => id,
            _ => {
                return Err(Failure::new(
                    REPLY_BAD_CHAT_ID,
                    RelayError::InvalidArguments(format!("bad chat ID {:?}", raw)),
                ))
            }
        };

        let user = self.register(chat_id)?;
        Ok(format!(
            "User created\nChat ID: {}\nID: {}",
            user.external_chat_id, user.id
        ))
    }
}
