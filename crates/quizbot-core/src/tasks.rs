use std::{future::Future, time::Duration};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// How a background continuation ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

/// Spawner for continuations that outlive the event that started them.
///
/// Each task is bounded by a timeout and stops when `shutdown` is called.
/// Failures are logged here and never reach the spawner.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    cancel: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn_bounded<F>(
        &self,
        name: &'static str,
        timeout: Duration,
        fut: F,
    ) -> JoinHandle<TaskOutcome>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => TaskOutcome::Cancelled,
                res = tokio::time::timeout(timeout, fut) => match res {
                    Ok(Ok(())) => TaskOutcome::Completed,
                    Ok(Err(e)) => {
                        tracing::error!(task = name, "background task failed: {e}");
                        TaskOutcome::Failed
                    }
                    Err(_) => {
                        tracing::warn!(task = name, timeout_secs = timeout.as_secs(), "background task timed out");
                        TaskOutcome::TimedOut
                    }
                },
            };
            tracing::debug!(task = name, ?outcome, "background task finished");
            outcome
        })
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
