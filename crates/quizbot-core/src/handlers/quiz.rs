use std::sync::Arc;

use crate::{
    dispatch::{Ack, CommandContext},
    domain::{AnswerSet, ChatId, MessageRef, Quiz},
    errors::Error,
    formatting::{escape_html, quiz_body},
    handlers::HandlerDeps,
    menus::{self, QuestionAction},
    messaging::port::MessagingPort,
    pending::{OperationKind, PendingOperation},
    Result,
};

const ANSWERS_EXAMPLE: &str = r#"{
  "answers": [
    {"answer": "Paris", "cost": 10},
    {"answer": "Lyon", "cost": 0}
  ]
}"#;

/// Post a quiz with its answer buttons. Questions with an image go out as a photo.
pub(crate) async fn send_quiz(
    messenger: &dyn MessagingPort,
    chat: ChatId,
    quiz: &Quiz,
    max_label: usize,
) -> Result<MessageRef> {
    let keyboard = menus::quiz_answers(&quiz.answers, max_label);
    let keyboard = (!keyboard.is_empty()).then_some(&keyboard);
    let body = quiz_body(&quiz.question);
    match &quiz.question.image {
        Some(file_id) => messenger.send_photo(chat, file_id, &body, keyboard).await,
        None => messenger.send_message(chat, &body, keyboard).await,
    }
}

pub async fn channel_list(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    deps.screens
        .channel_list(ctx.press.chat_id, Some(ctx.press.message.message_id))
        .await?;
    Ok(Ack::Silent)
}

pub async fn channel_menu(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    let channel = ctx.token.channel_id()?;
    deps.screens
        .channel_menu(ctx.press.chat_id, Some(ctx.press.message.message_id), channel)
        .await?;
    Ok(Ack::Silent)
}

pub async fn create_question(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    let channel = ctx.token.channel_id()?;
    // Fail before opening a slot that could never resolve.
    deps.screens.repo().channel(channel).await?;
    deps.open_prompt(
        &ctx,
        "Send the question text.",
        Some(&menus::cancel(None)),
        |prompt, origin| {
            PendingOperation::new(OperationKind::CreateQuestion, prompt, origin).for_channel(channel)
        },
    )
    .await
}

pub async fn question_list(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    list_with(deps, ctx, QuestionAction::Open).await
}

pub async fn delete_question(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    list_with(deps, ctx, QuestionAction::Delete).await
}

async fn list_with(
    deps: Arc<HandlerDeps>,
    ctx: CommandContext,
    action: QuestionAction,
) -> Result<Ack> {
    let channel = ctx.token.channel_id()?;
    deps.screens
        .question_list(
            ctx.press.chat_id,
            Some(ctx.press.message.message_id),
            channel,
            action,
        )
        .await?;
    Ok(Ack::Silent)
}

pub async fn question_get(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    let question = ctx.token.question_id()?;
    deps.screens
        .question_detail(ctx.press.chat_id, Some(ctx.press.message.message_id), question)
        .await?;
    Ok(Ack::Silent)
}

pub async fn question_delete(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    let id = ctx.token.question_id()?;
    let question = deps.screens.repo().question(id).await?;
    deps.screens.repo().delete_question(id).await?;
    tracing::info!(question = id.0, by = ctx.press.user_id.0, "question deleted");
    deps.screens
        .channel_menu(
            ctx.press.chat_id,
            Some(ctx.press.message.message_id),
            question.channel_id,
        )
        .await?;
    Ok(Ack::notice("Question deleted."))
}

pub async fn quiz_check(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    let quiz = deps.screens.repo().quiz(ctx.token.question_id()?).await?;
    send_quiz(
        deps.messenger().as_ref(),
        ctx.press.chat_id,
        &quiz,
        deps.screens.max_label(),
    )
    .await?;
    Ok(Ack::Silent)
}

pub async fn add_answers(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    let question = ctx.token.question_id()?;
    if deps.screens.repo().answers_exist(question).await? {
        return Ok(Ack::notice(
            "Answers already exist. Use \"Replace answers\" to change them.",
        ));
    }
    let text = format!(
        "Send the answers as JSON, for example:\n<pre>{}</pre>",
        escape_html(ANSWERS_EXAMPLE)
    );
    deps.open_prompt(
        &ctx,
        &text,
        Some(&menus::cancel(Some(question))),
        |prompt, origin| {
            PendingOperation::new(OperationKind::CreateAnswers, prompt, origin).for_question(question)
        },
    )
    .await
}

pub async fn update_answers(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    let question = ctx.token.question_id()?;
    let quiz = deps.screens.repo().quiz(question).await?;
    let current = serde_json::to_string_pretty(&AnswerSet::from_answers(&quiz.answers))?;
    let text = format!(
        "Current answers:\n<pre>{}</pre>\nSend the new answers JSON.",
        escape_html(&current)
    );
    deps.open_prompt(
        &ctx,
        &text,
        Some(&menus::cancel(Some(question))),
        |prompt, origin| {
            PendingOperation::new(OperationKind::ReplaceAnswers, prompt, origin).for_question(question)
        },
    )
    .await
}

pub async fn add_image(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    let question = ctx.token.question_id()?;
    deps.screens.repo().question(question).await?;
    deps.open_prompt(
        &ctx,
        "Send the image as a photo.",
        Some(&menus::cancel(Some(question))),
        |prompt, origin| {
            PendingOperation::new(OperationKind::SetImage, prompt, origin).for_question(question)
        },
    )
    .await
}

pub async fn update_question(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    let question = ctx.token.question_id()?;
    deps.screens.repo().question(question).await?;
    deps.open_prompt(
        &ctx,
        "Send the new question text.",
        Some(&menus::cancel(Some(question))),
        |prompt, origin| {
            PendingOperation::new(OperationKind::RenameQuestion, prompt, origin).for_question(question)
        },
    )
    .await
}

/// Cancels the prompt the button sits on. When that prompt still owns the
/// caller's slot, the slot and prompt go away and the originating menu is
/// redrawn. A stale prompt leaves any newer slot alone and turns into the menu
/// itself.
pub async fn cancel_update(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    let chat = ctx.press.chat_id;
    let pressed = ctx.press.message.message_id;
    let anchor = match deps.pending.take_if(ctx.press.user_id, |op| op.prompt == pressed) {
        Some(op) => {
            deps.screens.renderer().clear(chat, &[pressed]).await;
            op.origin
        }
        None => pressed,
    };

    match ctx.token.id() {
        Some(id) => {
            deps.screens
                .question_detail(chat, Some(anchor), crate::domain::QuestionId(id))
                .await?;
        }
        None => {
            deps.screens.main_menu(chat, Some(anchor)).await?;
        }
    }
    Ok(Ack::notice("Cancelled."))
}

pub async fn show_channels(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    let question = ctx.token.question_id()?;
    let channels = deps.screens.repo().channels().await?;
    let keyboard = menus::channel_picker(question, &channels, deps.screens.max_label());
    deps.screens
        .renderer()
        .show_menu(
            ctx.press.chat_id,
            Some(ctx.press.message.message_id),
            &keyboard,
            "Pick the channel to send the question to.",
        )
        .await?;
    Ok(Ack::Silent)
}

pub async fn channel_get(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    let target = ctx.token.composite()?;
    let repo = deps.screens.repo();
    let quiz = repo.quiz(target.question_id).await?;
    if quiz.answers.is_empty() {
        return Err(Error::InvalidInput(format!(
            "question {} has no answers",
            target.question_id
        )));
    }
    let channel = repo.channel(target.channel_id).await?;

    send_quiz(
        deps.messenger().as_ref(),
        ChatId(channel.id.0),
        &quiz,
        deps.screens.max_label(),
    )
    .await?;
    repo.mark_sent(target.question_id).await?;
    tracing::info!(
        question = target.question_id.0,
        channel = channel.id.0,
        "quiz published"
    );
    Ok(Ack::notice(format!("Sent to {}.", channel.title)))
}

pub async fn quiz_answer(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    let answer_id = ctx.token.answer_id()?;
    let repo = deps.screens.repo();
    let user = ctx.press.user_id;
    repo.upsert_user(user, ctx.press.username.as_deref()).await?;

    let answer = repo.answer(answer_id).await?;
    const ALREADY: &str = "You have already answered this question!";
    if repo.has_answered(user, answer.question_id).await? {
        return Ok(Ack::notice(ALREADY));
    }
    match repo.record_answer(user, answer_id).await {
        Ok(points) => Ok(Ack::notice(format!(
            "You earned {points} points for this answer."
        ))),
        // Lost a race with the same user's other tap.
        Err(Error::InvalidInput(_)) => Ok(Ack::notice(ALREADY)),
        Err(e) => Err(e),
    }
}
