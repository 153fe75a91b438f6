//! Results export.
//!
//! The CSV generator writes to one fixed path, so producing an artifact and
//! reading it back must not overlap with another export. `ExportGate` holds a
//! single async mutex across that whole section; the guard drops on every exit
//! path, including errors.

use std::{
    future::Future,
    path::PathBuf,
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{ChannelId, UserResult},
    errors::Error,
    formatting::plain_text,
    store::QuizRepository,
    Result,
};

#[derive(Default)]
pub struct ExportGate {
    lock: Mutex<()>,
}

impl ExportGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_export_lock<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.lock.lock().await;
        f().await
    }
}

/// Renders a result set to its on-disk location and returns that path.
#[async_trait]
pub trait ExportGenerator: Send + Sync {
    async fn write(&self, rows: &[UserResult]) -> Result<PathBuf>;
}

pub struct CsvExporter {
    path: PathBuf,
}

impl CsvExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ExportGenerator for CsvExporter {
    async fn write(&self, rows: &[UserResult]) -> Result<PathBuf> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        for row in rows {
            wtr.serialize(row)?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(self.path.clone())
    }
}

/// Finished export ready to be sent as a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct ExportService {
    repo: Arc<dyn QuizRepository>,
    gate: Arc<ExportGate>,
    generator: Arc<dyn ExportGenerator>,
}

impl ExportService {
    pub fn new(
        repo: Arc<dyn QuizRepository>,
        gate: Arc<ExportGate>,
        generator: Arc<dyn ExportGenerator>,
    ) -> Self {
        Self {
            repo,
            gate,
            generator,
        }
    }

    pub async fn export_channel(&self, channel: ChannelId) -> Result<Artifact> {
        self.gate
            .with_export_lock(move || async move {
                let mut rows = self.repo.results_by_channel(channel).await?;
                for row in &mut rows {
                    row.question_text = plain_text(&row.question_text);
                }
                let path = self.generator.write(&rows).await?;
                let bytes = tokio::fs::read(&path).await?;
                tracing::info!(channel = channel.0, rows = rows.len(), "results exported");
                Ok::<_, Error>(Artifact {
                    file_name: format!("rating_{channel}.csv"),
                    bytes,
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        domain::{Channel, NewQuestion, UserId},
        store::MemoryRepository,
    };

    #[tokio::test]
    async fn csv_export_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(MemoryRepository::new());
        repo.upsert_channel(Channel {
            id: ChannelId(3),
            title: "c".to_string(),
        })
        .await
        .unwrap();
        repo.upsert_user(UserId(9), Some("dave")).await.unwrap();
        let q = repo
            .create_question(NewQuestion {
                channel_id: ChannelId(3),
                created_by: UserId(1),
                text: "2+2?".to_string(),
            })
            .await
            .unwrap();
        let ids = repo
            .create_answers(
                q,
                &[crate::domain::AnswerArgs {
                    answer: "4".to_string(),
                    cost: 10,
                }],
            )
            .await
            .unwrap();
        repo.record_answer(UserId(9), ids[0]).await.unwrap();

        let service = ExportService::new(
            repo,
            Arc::new(ExportGate::new()),
            Arc::new(CsvExporter::new(dir.path().join("out.csv"))),
        );
        let artifact = service.export_channel(ChannelId(3)).await.unwrap();
        let text = String::from_utf8(artifact.bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("id,user_id,username,points,question_id,question_text")
        );
        let row = lines.next().unwrap();
        assert!(row.contains(",9,dave,10,"), "{row}");
        assert!(row.ends_with("2+2?"));
        assert_eq!(artifact.file_name, "rating_3.csv");
    }

    async fn seed_channel(repo: &MemoryRepository, channel: i64) {
        repo.upsert_channel(Channel {
            id: ChannelId(channel),
            title: format!("c{channel}"),
        })
        .await
        .unwrap();
        let q = repo
            .create_question(NewQuestion {
                channel_id: ChannelId(channel),
                created_by: UserId(1),
                text: format!("q{channel}"),
            })
            .await
            .unwrap();
        let ids = repo
            .create_answers(
                q,
                &[crate::domain::AnswerArgs {
                    answer: "a".to_string(),
                    cost: 1,
                }],
            )
            .await
            .unwrap();
        repo.record_answer(UserId(9), ids[0]).await.unwrap();
    }

    /// Writes the first row's question text, then lingers before handing the
    /// path back. Enter/exit marks go into a shared log.
    struct SlowGenerator {
        log: std::sync::Mutex<Vec<&'static str>>,
        path: PathBuf,
    }

    #[async_trait]
    impl ExportGenerator for SlowGenerator {
        async fn write(&self, rows: &[UserResult]) -> Result<PathBuf> {
            self.log.lock().unwrap().push("enter");
            let payload = rows
                .first()
                .map(|r| r.question_text.clone())
                .unwrap_or_default();
            tokio::fs::write(&self.path, payload).await?;
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.log.lock().unwrap().push("exit");
            Ok(self.path.clone())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_exports_read_back_their_own_render() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(MemoryRepository::new());
        for channel in 1..=4 {
            seed_channel(&repo, channel).await;
        }
        let generator = Arc::new(SlowGenerator {
            log: std::sync::Mutex::new(Vec::new()),
            path: dir.path().join("x.csv"),
        });
        let service = ExportService::new(repo, Arc::new(ExportGate::new()), generator.clone());

        let mut handles = Vec::new();
        for channel in 1..=4 {
            let s = service.clone();
            handles.push(tokio::spawn(async move {
                (channel, s.export_channel(ChannelId(channel)).await)
            }));
        }
        for h in handles {
            let (channel, artifact) = h.await.unwrap();
            assert_eq!(artifact.unwrap().bytes, format!("q{channel}").into_bytes());
        }

        let log = generator.log.lock().unwrap().clone();
        assert_eq!(log.len(), 8);
        for pair in log.chunks(2) {
            assert_eq!(pair, ["enter", "exit"]);
        }
    }

    #[tokio::test]
    async fn lock_is_released_after_an_error() {
        let gate = ExportGate::new();
        let first: Result<()> = gate
            .with_export_lock(|| async { Err(Error::Persistence("down".to_string())) })
            .await;
        assert!(first.is_err());
        let second = tokio::time::timeout(
            Duration::from_millis(100),
            gate.with_export_lock(|| async { 1 }),
        )
        .await;
        assert_eq!(second.unwrap(), 1);
    }
}
