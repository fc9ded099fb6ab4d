//! Telegram client using teloxide.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode};
use tracing::warn;

use crate::bot::messenger::{Keyboard, Messenger, Reply};

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.data.clone()))
            .collect::<Vec<_>>()
    }))
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send(&self, chat_id: i64, reply: &Reply) -> Result<i64, String> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), reply.text.clone())
            .parse_mode(ParseMode::Html);

        if let Some(ref keyboard) = reply.keyboard {
            request = request.reply_markup(markup(keyboard));
        }

        request.await.map(|msg| msg.id.0 as i64).map_err(|e| {
            let msg = format!("Failed to send to {chat_id}: {e}");
            warn!("{}", msg);
            msg
        })
    }

    async fn edit(&self, chat_id: i64, message_id: i64, reply: &Reply) -> Result<(), String> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id as i32), reply.text.clone())
            .parse_mode(ParseMode::Html);

        if let Some(ref keyboard) = reply.keyboard {
            request = request.reply_markup(markup(keyboard));
        }

        request.await.map(|_| ()).map_err(|e| {
            let msg = format!("Failed to edit message {message_id} in {chat_id}: {e}");
            warn!("{}", msg);
            msg
        })
    }

    async fn typing(&self, chat_id: i64) -> Result<(), String> {
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
            .map(|_| ())
            .map_err(|e| format!("Failed to send typing action: {e}"))
    }
}
