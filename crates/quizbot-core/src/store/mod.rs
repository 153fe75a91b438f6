//! Persistence port.
//!
//! The router only talks to storage through `QuizRepository`. Every call takes
//! plain identifiers; nothing transport-specific crosses this boundary. A
//! multi-row call such as `replace_answers` either fully applies or fully
//! fails.

use async_trait::async_trait;

use crate::{
    domain::{
        Answer, AnswerArgs, AnswerId, Channel, ChannelId, NewQuestion, Question, QuestionId, Quiz,
        Role, User, UserId, UserResult,
    },
    Result,
};

pub mod memory;

pub use memory::MemoryRepository;

/// Usernames compare case-insensitively and without the leading `@`.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_lowercase()
}

#[async_trait]
pub trait QuizRepository: Send + Sync {
    // Users

    /// Insert the user or refresh their username. Keeps an existing role.
    async fn upsert_user(&self, id: UserId, username: Option<&str>) -> Result<User>;
    async fn role_of(&self, id: UserId) -> Result<Role>;
    /// `NotFound` when no user has that username.
    async fn set_role_by_username(&self, username: &str, role: Role) -> Result<User>;
    async fn admins(&self) -> Result<Vec<User>>;

    // Channels

    async fn upsert_channel(&self, channel: Channel) -> Result<()>;
    async fn remove_channel(&self, id: ChannelId) -> Result<()>;
    async fn channel(&self, id: ChannelId) -> Result<Channel>;
    async fn channels(&self) -> Result<Vec<Channel>>;

    // Questions

    async fn create_question(&self, question: NewQuestion) -> Result<QuestionId>;
    async fn question(&self, id: QuestionId) -> Result<Question>;
    async fn questions_by_channel(&self, channel: ChannelId) -> Result<Vec<Question>>;
    async fn rename_question(&self, id: QuestionId, text: &str) -> Result<()>;
    async fn set_image(&self, id: QuestionId, file_id: &str) -> Result<()>;
    async fn mark_sent(&self, id: QuestionId) -> Result<()>;
    async fn delete_question(&self, id: QuestionId) -> Result<()>;

    // Answers

    async fn answers_exist(&self, question: QuestionId) -> Result<bool>;
    async fn create_answers(
        &self,
        question: QuestionId,
        answers: &[AnswerArgs],
    ) -> Result<Vec<AnswerId>>;
    /// Delete every answer of the question and insert the new set, atomically.
    async fn replace_answers(
        &self,
        question: QuestionId,
        answers: &[AnswerArgs],
    ) -> Result<Vec<AnswerId>>;
    async fn answer(&self, id: AnswerId) -> Result<Answer>;
    async fn quiz(&self, question: QuestionId) -> Result<Quiz>;

    // Results

    async fn has_answered(&self, user: UserId, question: QuestionId) -> Result<bool>;
    /// Store the user's points for the question the answer belongs to and mark it answered.
    async fn record_answer(&self, user: UserId, answer: AnswerId) -> Result<i64>;
    async fn results_by_channel(&self, channel: ChannelId) -> Result<Vec<UserResult>>;
    /// Zero the points of every result in the channel.
    async fn reset_results(&self, channel: ChannelId) -> Result<()>;
}
