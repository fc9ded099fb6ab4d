//! Bot core: per-user state, dispatch and the flows built on top of it.

pub mod access;
pub mod commands;
pub mod engine;
pub mod format;
mod handlers;
pub mod i18n;
pub mod messenger;
pub mod profile;
pub mod rate_limit;
pub mod reminders;
pub mod scheduler;
pub mod stats;
pub mod store;
pub mod telegram;
pub mod user;

pub use engine::{BotEngine, BotError, BotIdentity, ChatKind, Content, IncomingCallback, IncomingMessage, Sender};
pub use messenger::{Button, Keyboard, Messenger, Reply};
pub use store::Store;
pub use telegram::TelegramClient;
