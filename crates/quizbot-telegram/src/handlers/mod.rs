//! Telegram update handlers.
//!
//! Each handler converts a teloxide update into the transport-neutral event
//! the core router expects and hands it over. The router answers the user; the
//! handlers only log what came back.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, ChatMemberUpdated, Message, MessageEntity, MessageEntityKind},
};

use quizbot_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    formatting::{StyleKind, TextStyle},
    messaging::types::{ButtonPress, ChannelMembership, FreeFormMessage},
    router::log_failure,
};

use crate::router::AppState;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let Some(press) = button_press(&q) else {
        // Inline-mode buttons carry no message; nothing to route.
        let _ = bot.answer_callback_query(q.id).await;
        return Ok(());
    };

    if let Err(e) = state.router.handle_button(press).await {
        log_failure("callback", &e);
    }
    Ok(())
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(event) = free_form(&msg) else {
        return Ok(());
    };

    if let Err(e) = state.router.handle_message(event).await {
        log_failure("message", &e);
    }
    Ok(())
}

pub async fn handle_my_chat_member(
    update: ChatMemberUpdated,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let Some(change) = membership(&update) else {
        return Ok(());
    };

    if let Err(e) = state.router.handle_membership(change).await {
        log_failure("my_chat_member", &e);
    }
    Ok(())
}

pub(crate) fn button_press(q: &CallbackQuery) -> Option<ButtonPress> {
    let message = q.message.as_ref()?;
    let chat_id = ChatId(message.chat.id.0);
    Some(ButtonPress {
        chat_id,
        user_id: UserId(q.from.id.0 as i64),
        username: q.from.username.clone(),
        callback_id: q.id.clone(),
        data: q.data.clone().unwrap_or_default(),
        message: MessageRef::new(chat_id, MessageId(message.id.0)),
    })
}

/// Private text or photo messages from a real user. A photo's caption goes in `text`.
pub(crate) fn free_form(msg: &Message) -> Option<FreeFormMessage> {
    if !msg.chat.is_private() {
        return None;
    }
    let from = msg.from()?;
    let photo = msg
        .photo()
        .and_then(|sizes| sizes.iter().max_by_key(|p| p.width * p.height))
        .map(|p| p.file.id.clone());
    let (text, entities) = match msg.text() {
        Some(t) => (Some(t), msg.entities()),
        None => (msg.caption(), msg.caption_entities()),
    };
    let text = text.map(str::to_string);
    if text.is_none() && photo.is_none() {
        return None;
    }

    Some(FreeFormMessage {
        chat_id: ChatId(msg.chat.id.0),
        user_id: UserId(from.id.0 as i64),
        username: from.username.clone(),
        message_id: MessageId(msg.id.0),
        text,
        styles: entities.map(text_styles).unwrap_or_default(),
        photo,
    })
}

/// Formatting entities only; mentions, hashtags and bare urls stay plain text.
pub(crate) fn text_styles(entities: &[MessageEntity]) -> Vec<TextStyle> {
    entities
        .iter()
        .filter_map(|e| {
            let kind = match &e.kind {
                MessageEntityKind::Bold => StyleKind::Bold,
                MessageEntityKind::Italic => StyleKind::Italic,
                MessageEntityKind::Underline => StyleKind::Underline,
                MessageEntityKind::Strikethrough => StyleKind::Strikethrough,
                MessageEntityKind::Spoiler => StyleKind::Spoiler,
                MessageEntityKind::Code => StyleKind::Code,
                MessageEntityKind::Pre { language } => StyleKind::Pre(language.clone()),
                MessageEntityKind::TextLink { url } => StyleKind::Link(url.to_string()),
                _ => return None,
            };
            Some(TextStyle {
                kind,
                offset: e.offset,
                length: e.length,
            })
        })
        .collect()
}

/// Only channels matter; groups and private chats are ignored.
pub(crate) fn membership(update: &ChatMemberUpdated) -> Option<ChannelMembership> {
    if !update.chat.is_channel() {
        return None;
    }
    let kind = &update.new_chat_member.kind;
    Some(ChannelMembership {
        chat_id: ChatId(update.chat.id.0),
        title: update.chat.title().unwrap_or_default().to_string(),
        bot_is_admin: kind.is_administrator() || kind.is_owner(),
    })
}
