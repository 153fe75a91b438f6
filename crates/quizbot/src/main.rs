use std::sync::Arc;

use quizbot_core::{
    config::Config,
    store::{MemoryRepository, QuizRepository},
    tasks::BackgroundTasks,
};
use quizbot_postgres::PgRepository;

#[tokio::main]
async fn main() -> Result<(), quizbot_core::Error> {
    quizbot_core::logging::init("quizbot")?;

    let cfg = Arc::new(Config::load()?);
    let repo: Arc<dyn QuizRepository> = match cfg.database_url.as_deref() {
        Some(url) => Arc::new(PgRepository::connect(url, cfg.database_max_connections).await?),
        None => {
            tracing::warn!("DATABASE_URL is not set; quiz data is kept in memory and lost on restart");
            Arc::new(MemoryRepository::new())
        }
    };
    let tasks = BackgroundTasks::new();

    let result = quizbot_telegram::router::run_polling(cfg, repo, tasks.clone()).await;

    // Stop any export still running after the dispatcher shut down.
    tasks.shutdown();
    tracing::info!("quizbot stopped");

    result.map_err(|e| quizbot_core::Error::Transport(format!("telegram bot failed: {e}")))
}
