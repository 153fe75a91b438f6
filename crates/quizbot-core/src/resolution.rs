//! Applies a user's free-form reply to the operation their last prompt opened.
//!
//! A slot is consumed with `PendingStore::take` before anything else happens,
//! so the same reply can never be applied twice, and a failed mutation leaves
//! nothing behind: the user restarts the flow from the menu.

use std::sync::Arc;

use crate::{
    domain::{AnswerSet, ChatId, NewQuestion, Role},
    errors::Error,
    formatting::escape_html,
    menus::QuestionAction,
    messaging::types::FreeFormMessage,
    pending::{OperationKind, PendingOperation, PendingStore},
    screens::Screens,
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The sender had no open slot; the message is not ours to handle.
    NoPending,
    Applied(OperationKind),
}

pub struct ResolutionEngine {
    pending: Arc<PendingStore>,
    screens: Screens,
}

impl ResolutionEngine {
    pub fn new(pending: Arc<PendingStore>, screens: Screens) -> Self {
        Self { pending, screens }
    }

    pub async fn resolve(&self, msg: &FreeFormMessage) -> Result<Resolution> {
        let Some(op) = self.pending.take(msg.user_id) else {
            return Ok(Resolution::NoPending);
        };
        tracing::debug!(user = msg.user_id.0, kind = op.kind.as_str(), "resolving pending operation");

        let payload = payload_for(&op, msg)?;
        let note = self.apply(&op, msg, payload).await?;

        self.screens
            .renderer()
            .clear(msg.chat_id, &[op.prompt, op.origin])
            .await;
        self.render_after(msg.chat_id, &op, note.as_deref()).await?;

        tracing::info!(user = msg.user_id.0, kind = op.kind.as_str(), "pending operation applied");
        Ok(Resolution::Applied(op.kind))
    }

    /// Runs the single repository mutation bound to the operation kind.
    async fn apply(
        &self,
        op: &PendingOperation,
        msg: &FreeFormMessage,
        payload: &str,
    ) -> Result<Option<String>> {
        let repo = self.screens.repo();
        match op.kind {
            OperationKind::GrantRole => {
                let user = repo.set_role_by_username(payload, Role::Admin).await?;
                Ok(Some(format!("{} is now an admin.", display_name(&user.username, payload))))
            }
            OperationKind::RevokeRole => {
                let user = repo.set_role_by_username(payload, Role::User).await?;
                Ok(Some(format!("{} is no longer an admin.", display_name(&user.username, payload))))
            }
            OperationKind::CreateQuestion => {
                let channel_id = op
                    .channel_id
                    .ok_or_else(|| Error::InvalidInput("question prompt without a channel".to_string()))?;
                repo.create_question(NewQuestion {
                    channel_id,
                    created_by: msg.user_id,
                    text: question_text(msg, payload),
                })
                .await?;
                Ok(None)
            }
            OperationKind::CreateAnswers => {
                let set = parse_answer_set(payload)?;
                repo.create_answers(question_of(op)?, &set.answers).await?;
                Ok(None)
            }
            OperationKind::ReplaceAnswers => {
                let set = parse_answer_set(payload)?;
                repo.replace_answers(question_of(op)?, &set.answers).await?;
                Ok(None)
            }
            OperationKind::SetImage => {
                repo.set_image(question_of(op)?, payload).await?;
                Ok(None)
            }
            OperationKind::RenameQuestion => {
                repo.rename_question(question_of(op)?, &question_text(msg, payload))
                    .await?;
                Ok(None)
            }
        }
    }

    async fn render_after(
        &self,
        chat: ChatId,
        op: &PendingOperation,
        note: Option<&str>,
    ) -> Result<()> {
        if op.kind.is_role_change() {
            self.screens.user_settings(chat, None, note).await?;
            return Ok(());
        }
        match op.kind {
            OperationKind::CreateQuestion => {
                let channel = op
                    .channel_id
                    .ok_or_else(|| Error::InvalidInput("question prompt without a channel".to_string()))?;
                self.screens
                    .question_list(chat, None, channel, QuestionAction::Open)
                    .await?;
            }
            _ => {
                self.screens
                    .question_detail(chat, None, question_of(op)?)
                    .await?;
            }
        }
        Ok(())
    }
}

fn payload_for<'a>(op: &PendingOperation, msg: &'a FreeFormMessage) -> Result<&'a str> {
    if op.kind.expects_photo() {
        msg.photo
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("expected a photo".to_string()))
    } else {
        if msg.photo.is_some() {
            return Err(Error::InvalidInput("expected text, got a photo".to_string()));
        }
        msg.text()
            .ok_or_else(|| Error::InvalidInput("expected text".to_string()))
    }
}

/// Question bodies are stored as Telegram HTML.
fn question_text(msg: &FreeFormMessage, payload: &str) -> String {
    msg.html()
        .map(|html| html.trim().to_string())
        .unwrap_or_else(|| escape_html(payload.trim()))
}

fn question_of(op: &PendingOperation) -> Result<crate::domain::QuestionId> {
    op.question_id
        .ok_or_else(|| Error::InvalidInput(format!("{} prompt without a question", op.kind.as_str())))
}

fn parse_answer_set(raw: &str) -> Result<AnswerSet> {
    let set: AnswerSet = serde_json::from_str(raw.trim())
        .map_err(|e| Error::InvalidInput(format!("answers JSON: {e}")))?;
    if set.answers.is_empty() {
        return Err(Error::InvalidInput("answers JSON has no answers".to_string()));
    }
    if set.answers.iter().any(|a| a.answer.trim().is_empty()) {
        return Err(Error::InvalidInput("answers JSON has a blank answer".to_string()));
    }
    Ok(set)
}

fn display_name(stored: &Option<String>, typed: &str) -> String {
    let name = stored.as_deref().unwrap_or(typed).trim_start_matches('@');
    format!("@{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{Channel, ChannelId, MessageId, MessageRef, QuestionId, UserId},
        formatting::{StyleKind, TextStyle},
        render::Renderer,
        store::{MemoryRepository, QuizRepository},
        testing::{FakeMessenger, Sent},
    };

    struct Harness {
        fake: Arc<FakeMessenger>,
        repo: Arc<MemoryRepository>,
        pending: Arc<PendingStore>,
        engine: ResolutionEngine,
    }

    async fn harness() -> Harness {
        harness_with(FakeMessenger::default()).await
    }

    async fn harness_with(fake: FakeMessenger) -> Harness {
        let fake = Arc::new(fake);
        let repo = Arc::new(MemoryRepository::new());
        repo.upsert_channel(Channel {
            id: ChannelId(7),
            title: "Trivia".to_string(),
        })
        .await
        .unwrap();
        let pending = Arc::new(PendingStore::new());
        let screens = Screens::new(repo.clone(), Renderer::new(fake.clone()), 24);
        let engine = ResolutionEngine::new(pending.clone(), screens);
        Harness {
            fake,
            repo,
            pending,
            engine,
        }
    }

    fn text(user: i64, body: &str) -> FreeFormMessage {
        FreeFormMessage {
            chat_id: ChatId(user),
            user_id: UserId(user),
            username: None,
            message_id: MessageId(30),
            text: Some(body.to_string()),
            styles: Vec::new(),
            photo: None,
        }
    }

    fn photo(user: i64, file_id: &str) -> FreeFormMessage {
        FreeFormMessage {
            text: None,
            photo: Some(file_id.to_string()),
            ..text(user, "")
        }
    }

    #[tokio::test]
    async fn no_pending_slot_means_no_mutation() {
        let h = harness().await;
        let res = h.engine.resolve(&text(1, "hello")).await.unwrap();
        assert_eq!(res, Resolution::NoPending);
        assert!(h.fake.transcript().is_empty());
        assert!(h.repo.questions_by_channel(ChannelId(7)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_question_flow_cleans_up_and_lists_the_new_question() {
        let h = harness().await;
        h.pending.set(
            UserId(1),
            PendingOperation::new(OperationKind::CreateQuestion, MessageId(20), MessageId(10))
                .for_channel(ChannelId(7)),
        );

        let res = h.engine.resolve(&text(1, "What is 2+2?")).await.unwrap();
        assert_eq!(res, Resolution::Applied(OperationKind::CreateQuestion));
        assert!(h.pending.read(UserId(1)).is_none());

        let questions = h.repo.questions_by_channel(ChannelId(7)).await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text, "What is 2+2?");

        assert_eq!(
            h.fake.deleted(),
            vec![
                MessageRef::new(ChatId(1), MessageId(20)),
                MessageRef::new(ChatId(1), MessageId(10)),
            ]
        );
        let (_, keyboard) = h.fake.last_menu().unwrap();
        let keyboard = keyboard.unwrap();
        assert!(keyboard.contains_callback(&format!("question_get_{}", questions[0].id)));
        assert!(matches!(h.fake.transcript().last(), Some(Sent::Message { .. })));
    }

    #[tokio::test]
    async fn the_same_slot_is_applied_once() {
        let h = harness().await;
        h.pending.set(
            UserId(1),
            PendingOperation::new(OperationKind::CreateQuestion, MessageId(20), MessageId(10))
                .for_channel(ChannelId(7)),
        );

        let (first, second) = (text(1, "first"), text(1, "second"));
        let (a, b) = tokio::join!(h.engine.resolve(&first), h.engine.resolve(&second));
        let applied = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|r| matches!(r, Resolution::Applied(_)))
            .count();
        assert_eq!(applied, 1);
        assert_eq!(h.repo.questions_by_channel(ChannelId(7)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn wrong_shape_consumes_the_slot_without_mutating() {
        let h = harness().await;
        let q = h
            .repo
            .create_question(NewQuestion {
                channel_id: ChannelId(7),
                created_by: UserId(1),
                text: "q".to_string(),
            })
            .await
            .unwrap();
        h.pending.set(
            UserId(1),
            PendingOperation::new(OperationKind::SetImage, MessageId(20), MessageId(10))
                .for_question(q),
        );

        let err = h.engine.resolve(&text(1, "not a photo")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(h.pending.is_empty());
        assert_eq!(h.repo.question(q).await.unwrap().image, None);
        assert!(h.fake.transcript().is_empty());
    }

    #[tokio::test]
    async fn image_and_answers_land_on_the_question() {
        let h = harness().await;
        let q = h
            .repo
            .create_question(NewQuestion {
                channel_id: ChannelId(7),
                created_by: UserId(1),
                text: "q".to_string(),
            })
            .await
            .unwrap();

        h.pending.set(
            UserId(1),
            PendingOperation::new(OperationKind::SetImage, MessageId(20), MessageId(10))
                .for_question(q),
        );
        h.engine.resolve(&photo(1, "file-abc")).await.unwrap();
        assert_eq!(h.repo.question(q).await.unwrap().image.as_deref(), Some("file-abc"));

        h.pending.set(
            UserId(1),
            PendingOperation::new(OperationKind::CreateAnswers, MessageId(21), MessageId(11))
                .for_question(q),
        );
        h.engine
            .resolve(&text(1, r#"{"answers":[{"answer":"Four","cost":10}]}"#))
            .await
            .unwrap();
        let quiz = h.repo.quiz(q).await.unwrap();
        assert_eq!(quiz.answers.len(), 1);

        let (html, keyboard) = h.fake.last_menu().unwrap();
        assert!(html.contains("Four"));
        assert!(keyboard.unwrap().contains_callback(&format!("add_image_{q}")));
    }

    #[tokio::test]
    async fn failed_mutation_skips_cleanup_and_render() {
        let h = harness().await;
        h.pending.set(
            UserId(1),
            PendingOperation::new(OperationKind::RenameQuestion, MessageId(20), MessageId(10))
                .for_question(QuestionId(404)),
        );

        let err = h.engine.resolve(&text(1, "new text")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(h.pending.is_empty());
        assert!(h.fake.transcript().is_empty());
    }

    #[tokio::test]
    async fn role_grant_reports_on_the_user_menu() {
        let h = harness().await;
        h.repo.upsert_user(UserId(2), Some("Carol")).await.unwrap();
        h.pending.set(
            UserId(1),
            PendingOperation::new(OperationKind::GrantRole, MessageId(20), MessageId(10)),
        );

        h.engine.resolve(&text(1, "@carol")).await.unwrap();
        assert_eq!(h.repo.role_of(UserId(2)).await.unwrap(), Role::Admin);
        let (html, keyboard) = h.fake.last_menu().unwrap();
        assert!(html.contains("is now an admin"));
        assert!(keyboard.unwrap().contains_callback("admin_grant"));
    }

    #[tokio::test]
    async fn concurrent_users_do_not_cross_talk() {
        let h = harness().await;
        let q = h
            .repo
            .create_question(NewQuestion {
                channel_id: ChannelId(7),
                created_by: UserId(1),
                text: "old".to_string(),
            })
            .await
            .unwrap();
        h.pending.set(
            UserId(1),
            PendingOperation::new(OperationKind::CreateQuestion, MessageId(20), MessageId(10))
                .for_channel(ChannelId(7)),
        );
        h.pending.set(
            UserId(2),
            PendingOperation::new(OperationKind::RenameQuestion, MessageId(40), MessageId(41))
                .for_question(q),
        );

        let (from_one, from_two) = (text(1, "brand new"), text(2, "renamed"));
        let (a, b) = tokio::join!(h.engine.resolve(&from_one), h.engine.resolve(&from_two));
        assert_eq!(a.unwrap(), Resolution::Applied(OperationKind::CreateQuestion));
        assert_eq!(b.unwrap(), Resolution::Applied(OperationKind::RenameQuestion));

        let texts: Vec<String> = h
            .repo
            .questions_by_channel(ChannelId(7))
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.text)
            .collect();
        assert!(texts.contains(&"brand new".to_string()));
        assert!(texts.contains(&"renamed".to_string()));

        let deleted = h.fake.deleted();
        assert!(deleted.contains(&MessageRef::new(ChatId(1), MessageId(20))));
        assert!(deleted.contains(&MessageRef::new(ChatId(2), MessageId(40))));
        assert!(!deleted.contains(&MessageRef::new(ChatId(1), MessageId(40))));
    }

    fn create_question_slot(h: &Harness) {
        h.pending.set(
            UserId(1),
            PendingOperation::new(OperationKind::CreateQuestion, MessageId(20), MessageId(10))
                .for_channel(ChannelId(7)),
        );
    }

    #[tokio::test]
    async fn failed_cleanup_still_renders_the_menu() {
        let h = harness_with(FakeMessenger::failing_deletes()).await;
        create_question_slot(&h);

        let res = h.engine.resolve(&text(1, "Capital of France?")).await.unwrap();
        assert_eq!(res, Resolution::Applied(OperationKind::CreateQuestion));

        let questions = h.repo.questions_by_channel(ChannelId(7)).await.unwrap();
        assert_eq!(questions.len(), 1);
        assert!(h.fake.deleted().is_empty());
        let (_, keyboard) = h.fake.last_menu().unwrap();
        assert!(keyboard
            .unwrap()
            .contains_callback(&format!("question_get_{}", questions[0].id)));
    }

    #[tokio::test]
    async fn render_failure_reaches_the_caller_after_the_mutation() {
        let h = harness().await;
        create_question_slot(&h);
        h.fake.fail_sends();

        let err = h
            .engine
            .resolve(&text(1, "Capital of France?"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)), "{err:?}");
        assert!(h.pending.is_empty());
        assert_eq!(
            h.repo.questions_by_channel(ChannelId(7)).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn question_text_keeps_the_senders_formatting() {
        let h = harness().await;
        create_question_slot(&h);
        let msg = FreeFormMessage {
            styles: vec![TextStyle {
                kind: StyleKind::Bold,
                offset: 0,
                length: 4,
            }],
            ..text(1, "Name a <tag>")
        };

        h.engine.resolve(&msg).await.unwrap();

        let questions = h.repo.questions_by_channel(ChannelId(7)).await.unwrap();
        assert_eq!(questions[0].text, "<b>Name</b> a &lt;tag&gt;");
        let (_, keyboard) = h.fake.last_menu().unwrap();
        assert!(keyboard
            .unwrap()
            .buttons
            .iter()
            .any(|b| b.label.ends_with("Name a <tag>")));
    }
}
