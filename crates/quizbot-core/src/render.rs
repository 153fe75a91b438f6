//! Menu/prompt rendering on top of `MessagingPort`.

use std::sync::Arc;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    messaging::{port::MessagingPort, types::InlineKeyboard},
    Result,
};

#[derive(Clone)]
pub struct Renderer {
    messenger: Arc<dyn MessagingPort>,
}

impl Renderer {
    pub fn new(messenger: Arc<dyn MessagingPort>) -> Self {
        Self { messenger }
    }

    pub fn messenger(&self) -> &Arc<dyn MessagingPort> {
        &self.messenger
    }

    /// Edit `anchor` in place, or send a new message when there is no anchor.
    pub async fn show_menu(
        &self,
        chat: ChatId,
        anchor: Option<MessageId>,
        markup: &InlineKeyboard,
        text: &str,
    ) -> Result<MessageId> {
        let keyboard = (!markup.is_empty()).then_some(markup);
        match anchor {
            Some(id) => {
                self.messenger
                    .edit_message(MessageRef::new(chat, id), text, keyboard)
                    .await?;
                Ok(id)
            }
            None => Ok(self
                .messenger
                .send_message(chat, text, keyboard)
                .await?
                .message_id),
        }
    }

    /// Always a new message, so the user's reply lands below it.
    pub async fn show_prompt(
        &self,
        chat: ChatId,
        markup: Option<&InlineKeyboard>,
        text: &str,
    ) -> Result<MessageId> {
        let keyboard = markup.filter(|m| !m.is_empty());
        Ok(self
            .messenger
            .send_message(chat, text, keyboard)
            .await?
            .message_id)
    }

    /// Best-effort delete; failures are logged and dropped.
    pub async fn clear(&self, chat: ChatId, ids: &[MessageId]) {
        for id in ids {
            if let Err(e) = self
                .messenger
                .delete_message(MessageRef::new(chat, *id))
                .await
            {
                tracing::warn!(chat = chat.0, message = id.0, "delete failed: {e}");
            }
        }
    }

    pub async fn notify(&self, chat: ChatId, text: &str) -> Result<MessageId> {
        Ok(self.messenger.send_message(chat, text, None).await?.message_id)
    }
}
