//! Keyboard builders. Every callback payload is produced through `token`.

use crate::{
    domain::{Answer, Channel, ChannelId, Question, QuestionId},
    formatting::{plain_text, truncate_label},
    messaging::types::InlineKeyboard,
    token::{self, CompositeArgument},
};

pub const MAIN_MENU_TEXT: &str = "<b>Quiz bot</b>\nChoose what to manage.";
pub const USER_SETTINGS_TEXT: &str = "<b>User management</b>";

/// Which command a question button opens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuestionAction {
    Open,
    Delete,
}

impl QuestionAction {
    fn command(self) -> &'static str {
        match self {
            QuestionAction::Open => "question_get",
            QuestionAction::Delete => "question_delete",
        }
    }
}

pub fn start_menu() -> InlineKeyboard {
    InlineKeyboard::default()
        .push("Manage quizzes", "channel_list")
        .push("Manage users", "user_settings")
}

pub fn user_settings() -> InlineKeyboard {
    InlineKeyboard::default()
        .push("Grant admin role", "admin_grant")
        .push("Revoke admin role", "admin_revoke")
        .push("List admins", "admin_list")
        .push("Main menu", "main_menu")
}

pub fn channel_list(channels: &[Channel], max_label: usize) -> InlineKeyboard {
    let mut kb = InlineKeyboard::default();
    for ch in channels {
        kb = kb.push(
            truncate_label(&ch.title, max_label),
            token::encode_id("channel_menu", ch.id),
        );
    }
    kb.push("Main menu", "main_menu")
}

pub fn channel_menu(channel: ChannelId) -> InlineKeyboard {
    InlineKeyboard::default()
        .push("Create question", token::encode_id("create_question", channel))
        .push("Question list", token::encode_id("question_list", channel))
        .push("Delete question", token::encode_id("delete_question", channel))
        .push("Download rating", token::encode_id("rating_download", channel))
        .push("Reset rating", token::encode_id("rating_reset", channel))
        .push("Back", "channel_list")
}

pub fn question_list(
    channel: ChannelId,
    questions: &[Question],
    action: QuestionAction,
    max_label: usize,
) -> InlineKeyboard {
    let mut kb = InlineKeyboard::default();
    for q in questions {
        let mark = if q.is_sent { "✅" } else { "📝" };
        let label = format!("{mark} {}", truncate_label(&plain_text(&q.text), max_label));
        kb = kb.push(label, token::encode_id(action.command(), q.id));
    }
    kb.push("Back", token::encode_id("channel_menu", channel))
}

pub fn question_menu(question: &Question) -> InlineKeyboard {
    let id = question.id;
    InlineKeyboard::default()
        .push("Edit question", token::encode_id("update_question", id))
        .push("Add answers", token::encode_id("add_answers", id))
        .push("Replace answers", token::encode_id("update_answers", id))
        .push("Add image", token::encode_id("add_image", id))
        .push("Preview", token::encode_id("quiz_check", id))
        .push("Send to channel", token::encode_id("show_channels", id))
        .push("Back", token::encode_id("question_list", question.channel_id))
}

/// Cancel button under a prompt. Without a question it leads back to the start menu.
pub fn cancel(question: Option<QuestionId>) -> InlineKeyboard {
    let data = match question {
        Some(id) => token::encode_id("cancel_update", id),
        None => "cancel_update".to_string(),
    };
    InlineKeyboard::default().push("Cancel", data)
}

pub fn quiz_answers(answers: &[Answer], max_label: usize) -> InlineKeyboard {
    let mut kb = InlineKeyboard::default();
    for a in answers {
        kb = kb.push(
            truncate_label(&a.text, max_label),
            token::encode_id("quiz_answer", a.id),
        );
    }
    kb
}

pub fn channel_picker(question: QuestionId, channels: &[Channel], max_label: usize) -> InlineKeyboard {
    let mut kb = InlineKeyboard::default();
    for ch in channels {
        let arg = CompositeArgument {
            question_id: question,
            channel_id: ch.id,
        }
        .encode();
        kb = kb.push(
            truncate_label(&ch.title, max_label),
            token::encode("channel_get", Some(&arg)),
        );
    }
    kb.push("Back", token::encode_id("question_get", question))
}
