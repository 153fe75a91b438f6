use crate::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    formatting::{styled_html, TextStyle},
};

/// Inbound button press.
#[derive(Clone, Debug)]
pub struct ButtonPress {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub callback_id: String,
    pub data: String,
    /// Message the button was attached to.
    pub message: MessageRef,
}

/// Inbound free-form message (text and/or photo).
#[derive(Clone, Debug)]
pub struct FreeFormMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub message_id: MessageId,
    pub text: Option<String>,
    /// Formatting spans over `text`.
    pub styles: Vec<TextStyle>,
    /// File id of the highest-resolution photo size, if a photo was attached.
    pub photo: Option<String>,
}

impl FreeFormMessage {
    /// Text body, falling back to a photo caption the adapter put in `text`.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// Text body as Telegram HTML, keeping the sender's formatting.
    pub fn html(&self) -> Option<String> {
        self.text().map(|t| styled_html(t, &self.styles))
    }

    pub fn command(&self) -> Option<&str> {
        let text = self.text()?.trim();
        let first = text.split_whitespace().next()?;
        let cmd = first.strip_prefix('/')?;
        Some(cmd.split('@').next().unwrap_or(cmd))
    }
}

/// The bot's own membership changed in a channel.
#[derive(Clone, Debug)]
pub struct ChannelMembership {
    pub chat_id: ChatId,
    pub title: String,
    /// Whether the bot can now post there.
    pub bot_is_admin: bool,
}

/// Inline keyboard, one button per row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback_data: callback_data.into(),
        }
    }
}

impl InlineKeyboard {
    pub fn push(mut self, label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        self.buttons.push(InlineButton::new(label, callback_data));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }

    pub fn contains_callback(&self, callback_data: &str) -> bool {
        self.buttons.iter().any(|b| b.callback_data == callback_data)
    }
}
