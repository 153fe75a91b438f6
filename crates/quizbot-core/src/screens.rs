//! Full-screen menus that both button handlers and the resolution engine draw.

use std::sync::Arc;

use crate::{
    domain::{ChannelId, ChatId, MessageId, QuestionId},
    formatting::{escape_html, question_card},
    menus::{self, QuestionAction},
    render::Renderer,
    store::QuizRepository,
    Result,
};

#[derive(Clone)]
pub struct Screens {
    repo: Arc<dyn QuizRepository>,
    renderer: Renderer,
    max_label: usize,
}

impl Screens {
    pub fn new(repo: Arc<dyn QuizRepository>, renderer: Renderer, max_label: usize) -> Self {
        Self {
            repo,
            renderer,
            max_label,
        }
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn repo(&self) -> &Arc<dyn QuizRepository> {
        &self.repo
    }

    pub fn max_label(&self) -> usize {
        self.max_label
    }

    pub async fn main_menu(&self, chat: ChatId, anchor: Option<MessageId>) -> Result<MessageId> {
        self.renderer
            .show_menu(chat, anchor, &menus::start_menu(), menus::MAIN_MENU_TEXT)
            .await
    }

    /// User-management menu, optionally headed by a status line.
    pub async fn user_settings(
        &self,
        chat: ChatId,
        anchor: Option<MessageId>,
        note: Option<&str>,
    ) -> Result<MessageId> {
        let text = match note {
            Some(n) => format!("{}\n\n{}", escape_html(n), menus::USER_SETTINGS_TEXT),
            None => menus::USER_SETTINGS_TEXT.to_string(),
        };
        self.renderer
            .show_menu(chat, anchor, &menus::user_settings(), &text)
            .await
    }

    pub async fn channel_list(&self, chat: ChatId, anchor: Option<MessageId>) -> Result<MessageId> {
        let channels = self.repo.channels().await?;
        let text = if channels.is_empty() {
            "No channels yet. Add the bot to a channel as an administrator."
        } else {
            "<b>Channels</b>"
        };
        self.renderer
            .show_menu(
                chat,
                anchor,
                &menus::channel_list(&channels, self.max_label),
                text,
            )
            .await
    }

    pub async fn channel_menu(
        &self,
        chat: ChatId,
        anchor: Option<MessageId>,
        channel: ChannelId,
    ) -> Result<MessageId> {
        let ch = self.repo.channel(channel).await?;
        let text = format!("<b>{}</b>\nQuiz menu", escape_html(&ch.title));
        self.renderer
            .show_menu(chat, anchor, &menus::channel_menu(channel), &text)
            .await
    }

    pub async fn question_list(
        &self,
        chat: ChatId,
        anchor: Option<MessageId>,
        channel: ChannelId,
        action: QuestionAction,
    ) -> Result<MessageId> {
        let questions = self.repo.questions_by_channel(channel).await?;
        let text = match (questions.is_empty(), action) {
            (true, _) => "No questions in this channel yet.",
            (false, QuestionAction::Open) => "<b>Questions</b>",
            (false, QuestionAction::Delete) => "<b>Pick a question to delete</b>",
        };
        let kb = menus::question_list(channel, &questions, action, self.max_label);
        self.renderer.show_menu(chat, anchor, &kb, text).await
    }

    /// Question detail, always re-fetched.
    pub async fn question_detail(
        &self,
        chat: ChatId,
        anchor: Option<MessageId>,
        question: QuestionId,
    ) -> Result<MessageId> {
        let quiz = self.repo.quiz(question).await?;
        let text = question_card(&quiz.question, &quiz.answers);
        self.renderer
            .show_menu(chat, anchor, &menus::question_menu(&quiz.question), &text)
            .await
    }
}
