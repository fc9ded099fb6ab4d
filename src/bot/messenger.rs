//! Outbound side of the chat platform, kept behind a trait so the engine can
//! run against a recording double in tests.

use async_trait::async_trait;

/// One inline button: label shown to the user, payload sent back on press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }

    pub fn button(self, label: impl Into<String>, data: impl Into<String>) -> Self {
        self.row(vec![Button::new(label, data)])
    }
}

/// An HTML-formatted message with an optional inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a message, returning its ID.
    async fn send(&self, chat_id: i64, reply: &Reply) -> Result<i64, String>;

    /// Replace the text and keyboard of a message the bot sent earlier.
    async fn edit(&self, chat_id: i64, message_id: i64, reply: &Reply) -> Result<(), String>;

    /// Show the "typing…" indicator.
    async fn typing(&self, chat_id: i64) -> Result<(), String>;
}
