use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use quizbot_core::{
    config::Config,
    export::CsvExporter,
    messaging::port::MessagingPort,
    pending::PendingStore,
    router::{Router, RouterServices},
    security::RoleGate,
    store::QuizRepository,
    tasks::BackgroundTasks,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
}

pub async fn run_polling(
    cfg: Arc<Config>,
    repo: Arc<dyn QuizRepository>,
    tasks: BackgroundTasks,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(bot = %me.username(), "quizbot started"),
        Err(e) => tracing::warn!("get_me failed: {e}"),
    }
    tracing::info!(
        bootstrap_admins = cfg.admins.len(),
        export_path = %cfg.export_path.display(),
        "configuration loaded"
    );

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let router = Arc::new(Router::new(RouterServices {
        messenger,
        repo: repo.clone(),
        gate: Arc::new(RoleGate::new(repo, &cfg.admins)),
        exporter: Arc::new(CsvExporter::new(cfg.export_path.clone())),
        pending: Arc::new(PendingStore::with_ttl(cfg.pending_ttl)),
        tasks,
        export_timeout: cfg.export_timeout,
        button_label_max_length: cfg.button_label_max_length,
    }));

    let state = Arc::new(AppState { router });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message))
        .branch(Update::filter_my_chat_member().endpoint(handlers::handle_my_chat_member));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
