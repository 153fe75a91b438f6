//! Button command handlers and their registration.

use std::{future::Future, sync::Arc, time::Duration};

use crate::{
    dispatch::{handler_fn, Ack, CommandContext, CommandHandler, DispatchTable},
    domain::{MessageId, Role},
    export::ExportService,
    messaging::port::MessagingPort,
    pending::{PendingOperation, PendingStore},
    screens::Screens,
    tasks::BackgroundTasks,
    Result,
};

pub mod quiz;
pub mod rating;
pub mod users;

/// Shared services every handler may use.
pub struct HandlerDeps {
    pub screens: Screens,
    pub pending: Arc<PendingStore>,
    pub exports: ExportService,
    pub tasks: BackgroundTasks,
    pub export_timeout: Duration,
}

impl HandlerDeps {
    pub fn messenger(&self) -> &Arc<dyn MessagingPort> {
        self.screens.renderer().messenger()
    }

    /// Send `text` as a new prompt and open the caller's slot for it.
    pub(crate) async fn open_prompt(
        &self,
        ctx: &CommandContext,
        text: &str,
        keyboard: Option<&crate::messaging::types::InlineKeyboard>,
        op: impl FnOnce(MessageId, MessageId) -> PendingOperation,
    ) -> Result<Ack> {
        let prompt = self
            .screens
            .renderer()
            .show_prompt(ctx.press.chat_id, keyboard, text)
            .await?;
        let op = op(prompt, ctx.press.message.message_id);
        tracing::debug!(user = ctx.press.user_id.0, kind = op.kind.as_str(), "prompt opened");
        self.pending.set(ctx.press.user_id, op);
        Ok(Ack::Silent)
    }
}

fn route<F, Fut>(deps: &Arc<HandlerDeps>, f: F) -> Arc<dyn CommandHandler>
where
    F: Fn(Arc<HandlerDeps>, CommandContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Ack>> + Send + 'static,
{
    let deps = deps.clone();
    handler_fn(move |ctx| f(deps.clone(), ctx))
}

pub fn register_all(table: &mut DispatchTable, deps: &Arc<HandlerDeps>) {
    let admin = |table: &mut DispatchTable, name: &str, h: Arc<dyn CommandHandler>| {
        table.register_gated(name, Role::Admin, h)
    };

    admin(table, "main_menu", route(deps, users::main_menu));
    admin(table, "user_settings", route(deps, users::user_settings));
    admin(table, "admin_list", route(deps, users::admin_list));
    admin(table, "admin_grant", route(deps, users::admin_grant));
    admin(table, "admin_revoke", route(deps, users::admin_revoke));

    admin(table, "channel_list", route(deps, quiz::channel_list));
    admin(table, "channel_menu", route(deps, quiz::channel_menu));
    admin(table, "create_question", route(deps, quiz::create_question));
    admin(table, "question_list", route(deps, quiz::question_list));
    admin(table, "delete_question", route(deps, quiz::delete_question));
    admin(table, "question_get", route(deps, quiz::question_get));
    admin(table, "question_delete", route(deps, quiz::question_delete));
    admin(table, "quiz_check", route(deps, quiz::quiz_check));
    admin(table, "add_answers", route(deps, quiz::add_answers));
    admin(table, "update_answers", route(deps, quiz::update_answers));
    admin(table, "add_image", route(deps, quiz::add_image));
    admin(table, "update_question", route(deps, quiz::update_question));
    admin(table, "cancel_update", route(deps, quiz::cancel_update));
    admin(table, "show_channels", route(deps, quiz::show_channels));
    admin(table, "channel_get", route(deps, quiz::channel_get));

    admin(table, "rating_download", route(deps, rating::rating_download));
    admin(table, "rating_reset", route(deps, rating::rating_reset));

    // Channel members answer quizzes; no role required.
    table.register("quiz_answer", route(deps, quiz::quiz_answer));
}
