//! Transport-neutral entry point for inbound events.
//!
//! Adapters convert their updates into `ButtonPress`, `FreeFormMessage` or
//! `ChannelMembership` and hand them here. Errors are reported to the user
//! (button acknowledgement or a chat message) and also returned so the adapter
//! can log them.

use std::{sync::Arc, time::Duration};

use crate::{
    dispatch::{CommandContext, DispatchTable},
    domain::{Channel, ChannelId, Role},
    errors::Error,
    export::{ExportGate, ExportGenerator, ExportService},
    handlers::{self, HandlerDeps},
    messaging::{
        port::MessagingPort,
        types::{ButtonPress, ChannelMembership, FreeFormMessage},
    },
    pending::PendingStore,
    render::Renderer,
    resolution::{Resolution, ResolutionEngine},
    screens::Screens,
    security::AuthorizationGate,
    store::QuizRepository,
    tasks::BackgroundTasks,
    token::CommandToken,
    Result,
};

/// Everything the router is wired from.
pub struct RouterServices {
    pub messenger: Arc<dyn MessagingPort>,
    pub repo: Arc<dyn QuizRepository>,
    pub gate: Arc<dyn AuthorizationGate>,
    pub exporter: Arc<dyn ExportGenerator>,
    pub pending: Arc<PendingStore>,
    pub tasks: BackgroundTasks,
    pub export_timeout: Duration,
    pub button_label_max_length: usize,
}

pub struct Router {
    table: DispatchTable,
    engine: ResolutionEngine,
    screens: Screens,
    pending: Arc<PendingStore>,
    gate: Arc<dyn AuthorizationGate>,
}

impl Router {
    pub fn new(services: RouterServices) -> Self {
        let renderer = Renderer::new(services.messenger.clone());
        let screens = Screens::new(
            services.repo.clone(),
            renderer,
            services.button_label_max_length,
        );
        let exports = ExportService::new(
            services.repo.clone(),
            Arc::new(ExportGate::new()),
            services.exporter,
        );
        let deps = Arc::new(HandlerDeps {
            screens: screens.clone(),
            pending: services.pending.clone(),
            exports,
            tasks: services.tasks,
            export_timeout: services.export_timeout,
        });

        let mut table = DispatchTable::new(services.gate.clone());
        handlers::register_all(&mut table, &deps);

        Self {
            table,
            engine: ResolutionEngine::new(services.pending.clone(), screens.clone()),
            screens,
            pending: services.pending,
            gate: services.gate,
        }
    }

    fn messenger(&self) -> &Arc<dyn MessagingPort> {
        self.screens.renderer().messenger()
    }

    /// Decode, dispatch, and always answer the callback query.
    pub async fn handle_button(&self, press: ButtonPress) -> Result<()> {
        let token = CommandToken::decode(&press.data);
        tracing::debug!(
            user = press.user_id.0,
            command = %token.name,
            argument = ?token.argument,
            "button press"
        );
        let callback_id = press.callback_id.clone();

        let result = self.table.dispatch(CommandContext { press, token }).await;
        let ack = match &result {
            Ok(ack) => ack.text().map(str::to_string),
            Err(e) => Some(e.user_message().to_string()),
        };
        if let Err(e) = self
            .messenger()
            .answer_callback_query(&callback_id, ack.as_deref())
            .await
        {
            tracing::warn!("answer_callback_query failed: {e}");
        }

        result.map(|_| ())
    }

    /// Text commands first, then the sender's pending operation, if any.
    pub async fn handle_message(&self, msg: FreeFormMessage) -> Result<()> {
        match msg.command() {
            Some("cancel") => return self.cancel(&msg).await,
            Some("start") => return self.start(&msg).await,
            _ => {}
        }

        match self.engine.resolve(&msg).await {
            Ok(Resolution::NoPending) => {
                tracing::debug!(user = msg.user_id.0, "message without pending operation ignored");
                Ok(())
            }
            Ok(Resolution::Applied(_)) => Ok(()),
            Err(e) => {
                if let Err(send_err) = self
                    .screens
                    .renderer()
                    .notify(msg.chat_id, e.user_message())
                    .await
                {
                    tracing::warn!("failed to report error to user: {send_err}");
                }
                Err(e)
            }
        }
    }

    /// Keep the channel list in step with where the bot may post.
    pub async fn handle_membership(&self, change: ChannelMembership) -> Result<()> {
        let id = ChannelId(change.chat_id.0);
        if change.bot_is_admin {
            tracing::info!(channel = id.0, title = %change.title, "channel registered");
            self.screens
                .repo()
                .upsert_channel(Channel {
                    id,
                    title: change.title,
                })
                .await
        } else {
            tracing::info!(channel = id.0, "channel removed");
            self.screens.repo().remove_channel(id).await
        }
    }

    async fn start(&self, msg: &FreeFormMessage) -> Result<()> {
        self.screens
            .repo()
            .upsert_user(msg.user_id, msg.username.as_deref())
            .await?;
        if !self.gate.allows(msg.user_id, Role::Admin).await? {
            self.screens
                .renderer()
                .notify(msg.chat_id, "This bot is managed by quiz administrators only.")
                .await?;
            return Ok(());
        }
        self.pending.delete(msg.user_id);
        self.screens.main_menu(msg.chat_id, None).await?;
        Ok(())
    }

    async fn cancel(&self, msg: &FreeFormMessage) -> Result<()> {
        let renderer = self.screens.renderer();
        match self.pending.take(msg.user_id) {
            Some(op) => {
                renderer.clear(msg.chat_id, &[op.prompt]).await;
                renderer.notify(msg.chat_id, "Cancelled.").await?;
            }
            None => {
                renderer.notify(msg.chat_id, "Nothing to cancel.").await?;
            }
        }
        Ok(())
    }
}

/// Log level for a failed event: user mistakes are routine, the rest is not.
pub fn log_failure(event: &str, e: &Error) {
    if e.is_terminal_for_user() {
        tracing::info!(event, "{e}");
    } else {
        tracing::error!(event, "{e}");
    }
}
