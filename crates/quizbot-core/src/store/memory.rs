use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    domain::{
        Answer, AnswerArgs, AnswerId, Channel, ChannelId, NewQuestion, Question, QuestionId, Quiz,
        Role, User, UserId, UserResult,
    },
    errors::Error,
    store::{normalize_username, QuizRepository},
    Result,
};

#[derive(Clone, Debug)]
struct ResultRow {
    id: i64,
    user_id: UserId,
    question_id: QuestionId,
    points: i64,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<UserId, User>,
    channels: BTreeMap<ChannelId, Channel>,
    questions: BTreeMap<QuestionId, Question>,
    answers: BTreeMap<AnswerId, Answer>,
    results: Vec<ResultRow>,
    answered: HashSet<(UserId, QuestionId)>,
    next_question: i64,
    next_answer: i64,
    next_result: i64,
}

impl Inner {
    fn question(&self, id: QuestionId) -> Result<&Question> {
        self.questions
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("question {id}")))
    }

    fn question_mut(&mut self, id: QuestionId) -> Result<&mut Question> {
        self.questions
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("question {id}")))
    }

    fn insert_answers(&mut self, question: QuestionId, answers: &[AnswerArgs]) -> Vec<AnswerId> {
        answers
            .iter()
            .map(|a| {
                self.next_answer += 1;
                let id = AnswerId(self.next_answer);
                self.answers.insert(
                    id,
                    Answer {
                        id,
                        question_id: question,
                        text: a.answer.clone(),
                        cost: a.cost,
                    },
                );
                id
            })
            .collect()
    }

    fn answers_of(&self, question: QuestionId) -> Vec<Answer> {
        self.answers
            .values()
            .filter(|a| a.question_id == question)
            .cloned()
            .collect()
    }
}

/// In-process `QuizRepository`.
///
/// Everything sits behind one `RwLock`, so each trait call is atomic with
/// respect to the others. State is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    inner: RwLock<Inner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuizRepository for MemoryRepository {
    async fn upsert_user(&self, id: UserId, username: Option<&str>) -> Result<User> {
        let mut inner = self.inner.write().await;
        let user = inner.users.entry(id).or_insert_with(|| User {
            id,
            username: None,
            role: Role::User,
        });
        if let Some(name) = username {
            user.username = Some(name.to_string());
        }
        Ok(user.clone())
    }

    async fn role_of(&self, id: UserId) -> Result<Role> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).map(|u| u.role).unwrap_or_default())
    }

    async fn set_role_by_username(&self, username: &str, role: Role) -> Result<User> {
        let wanted = normalize_username(username);
        if wanted.is_empty() {
            return Err(Error::InvalidInput("empty username".to_string()));
        }

        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .values_mut()
            .find(|u| {
                u.username
                    .as_deref()
                    .is_some_and(|n| normalize_username(n) == wanted)
            })
            .ok_or_else(|| Error::NotFound(format!("user @{wanted}")))?;
        user.role = role;
        Ok(user.clone())
    }

    async fn admins(&self) -> Result<Vec<User>> {
        let inner = self.inner.read().await;
        let mut out: Vec<User> = inner
            .users
            .values()
            .filter(|u| u.role >= Role::Admin)
            .cloned()
            .collect();
        out.sort_by_key(|u| u.id.0);
        Ok(out)
    }

    async fn upsert_channel(&self, channel: Channel) -> Result<()> {
        self.inner
            .write()
            .await
            .channels
            .insert(channel.id, channel);
        Ok(())
    }

    async fn remove_channel(&self, id: ChannelId) -> Result<()> {
        self.inner.write().await.channels.remove(&id);
        Ok(())
    }

    async fn channel(&self, id: ChannelId) -> Result<Channel> {
        self.inner
            .read()
            .await
            .channels
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("channel {id}")))
    }

    async fn channels(&self) -> Result<Vec<Channel>> {
        Ok(self.inner.read().await.channels.values().cloned().collect())
    }

    async fn create_question(&self, question: NewQuestion) -> Result<QuestionId> {
        let mut inner = self.inner.write().await;
        if !inner.channels.contains_key(&question.channel_id) {
            return Err(Error::NotFound(format!("channel {}", question.channel_id)));
        }

        inner.next_question += 1;
        let id = QuestionId(inner.next_question);
        inner.questions.insert(
            id,
            Question {
                id,
                channel_id: question.channel_id,
                created_by: question.created_by,
                created_at: Utc::now(),
                text: question.text,
                image: None,
                is_sent: false,
            },
        );
        Ok(id)
    }

    async fn question(&self, id: QuestionId) -> Result<Question> {
        self.inner.read().await.question(id).cloned()
    }

    async fn questions_by_channel(&self, channel: ChannelId) -> Result<Vec<Question>> {
        let inner = self.inner.read().await;
        Ok(inner
            .questions
            .values()
            .filter(|q| q.channel_id == channel)
            .cloned()
            .collect())
    }

    async fn rename_question(&self, id: QuestionId, text: &str) -> Result<()> {
        self.inner.write().await.question_mut(id)?.text = text.to_string();
        Ok(())
    }

    async fn set_image(&self, id: QuestionId, file_id: &str) -> Result<()> {
        self.inner.write().await.question_mut(id)?.image = Some(file_id.to_string());
        Ok(())
    }

    async fn mark_sent(&self, id: QuestionId) -> Result<()> {
        self.inner.write().await.question_mut(id)?.is_sent = true;
        Ok(())
    }

    async fn delete_question(&self, id: QuestionId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.questions.remove(&id).is_none() {
            return Err(Error::NotFound(format!("question {id}")));
        }
        inner.answers.retain(|_, a| a.question_id != id);
        inner.results.retain(|r| r.question_id != id);
        inner.answered.retain(|(_, q)| *q != id);
        Ok(())
    }

    async fn answers_exist(&self, question: QuestionId) -> Result<bool> {
        let inner = self.inner.read().await;
        inner.question(question)?;
        Ok(inner.answers.values().any(|a| a.question_id == question))
    }

    async fn create_answers(
        &self,
        question: QuestionId,
        answers: &[AnswerArgs],
    ) -> Result<Vec<AnswerId>> {
        let mut inner = self.inner.write().await;
        inner.question(question)?;
        Ok(inner.insert_answers(question, answers))
    }

    async fn replace_answers(
        &self,
        question: QuestionId,
        answers: &[AnswerArgs],
    ) -> Result<Vec<AnswerId>> {
        let mut inner = self.inner.write().await;
        inner.question(question)?;
        inner.answers.retain(|_, a| a.question_id != question);
        Ok(inner.insert_answers(question, answers))
    }

    async fn answer(&self, id: AnswerId) -> Result<Answer> {
        self.inner
            .read()
            .await
            .answers
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("answer {id}")))
    }

    async fn quiz(&self, question: QuestionId) -> Result<Quiz> {
        let inner = self.inner.read().await;
        let q = inner.question(question)?.clone();
        Ok(Quiz {
            answers: inner.answers_of(question),
            question: q,
        })
    }

    async fn has_answered(&self, user: UserId, question: QuestionId) -> Result<bool> {
        Ok(self.inner.read().await.answered.contains(&(user, question)))
    }

    async fn record_answer(&self, user: UserId, answer: AnswerId) -> Result<i64> {
        let mut inner = self.inner.write().await;
        let picked = inner
            .answers
            .get(&answer)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("answer {answer}")))?;

        if !inner.answered.insert((user, picked.question_id)) {
            return Err(Error::InvalidInput(format!(
                "user {} already answered question {}",
                user.0, picked.question_id
            )));
        }

        inner.next_result += 1;
        let id = inner.next_result;
        inner.results.push(ResultRow {
            id,
            user_id: user,
            question_id: picked.question_id,
            points: picked.cost,
        });
        Ok(picked.cost)
    }

    async fn results_by_channel(&self, channel: ChannelId) -> Result<Vec<UserResult>> {
        let inner = self.inner.read().await;
        Ok(inner
            .results
            .iter()
            .filter_map(|r| {
                let q = inner.questions.get(&r.question_id)?;
                if q.channel_id != channel {
                    return None;
                }
                let username = inner
                    .users
                    .get(&r.user_id)
                    .and_then(|u| u.username.clone())
                    .unwrap_or_default();
                Some(UserResult {
                    id: r.id,
                    user_id: r.user_id.0,
                    username,
                    points: r.points,
                    question_id: q.id.0,
                    question_text: q.text.clone(),
                })
            })
            .collect())
    }

    async fn reset_results(&self, channel: ChannelId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let in_channel: HashSet<QuestionId> = inner
            .questions
            .values()
            .filter(|q| q.channel_id == channel)
            .map(|q| q.id)
            .collect();
        for row in inner.results.iter_mut() {
            if in_channel.contains(&row.question_id) {
                row.points = 0;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (MemoryRepository, QuestionId) {
        let repo = MemoryRepository::new();
        repo.upsert_channel(Channel {
            id: ChannelId(7),
            title: "Quiz".to_string(),
        })
        .await
        .unwrap();
        let q = repo
            .create_question(NewQuestion {
                channel_id: ChannelId(7),
                created_by: UserId(1),
                text: "What is 2+2?".to_string(),
            })
            .await
            .unwrap();
        (repo, q)
    }

    fn args(pairs: &[(&str, i64)]) -> Vec<AnswerArgs> {
        pairs
            .iter()
            .map(|(a, c)| AnswerArgs {
                answer: a.to_string(),
                cost: *c,
            })
            .collect()
    }

    #[tokio::test]
    async fn question_in_unknown_channel_is_not_found() {
        let repo = MemoryRepository::new();
        let err = repo
            .create_question(NewQuestion {
                channel_id: ChannelId(99),
                created_by: UserId(1),
                text: "x".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn replace_answers_swaps_the_whole_set() {
        let (repo, q) = seeded().await;
        repo.create_answers(q, &args(&[("3", 0), ("4", 10)]))
            .await
            .unwrap();
        repo.replace_answers(q, &args(&[("four", 5)])).await.unwrap();

        let quiz = repo.quiz(q).await.unwrap();
        assert_eq!(quiz.answers.len(), 1);
        assert_eq!(quiz.answers[0].text, "four");
    }

    #[tokio::test]
    async fn role_change_by_username_ignores_at_sign_and_case() {
        let repo = MemoryRepository::new();
        repo.upsert_user(UserId(5), Some("Alice")).await.unwrap();

        let user = repo
            .set_role_by_username("@alice", Role::Admin)
            .await
            .unwrap();
        assert_eq!(user.id, UserId(5));
        assert_eq!(repo.role_of(UserId(5)).await.unwrap(), Role::Admin);
        assert_eq!(repo.admins().await.unwrap().len(), 1);

        let err = repo
            .set_role_by_username("bob", Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn answers_are_recorded_once_and_reset_per_channel() {
        let (repo, q) = seeded().await;
        let ids = repo
            .create_answers(q, &args(&[("3", 0), ("4", 10)]))
            .await
            .unwrap();
        repo.upsert_user(UserId(2), Some("bob")).await.unwrap();

        assert_eq!(repo.record_answer(UserId(2), ids[1]).await.unwrap(), 10);
        assert!(repo.has_answered(UserId(2), q).await.unwrap());
        assert!(repo.record_answer(UserId(2), ids[0]).await.is_err());

        let results = repo.results_by_channel(ChannelId(7)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].username, "bob");
        assert_eq!(results[0].points, 10);

        repo.reset_results(ChannelId(7)).await.unwrap();
        let results = repo.results_by_channel(ChannelId(7)).await.unwrap();
        assert_eq!(results[0].points, 0);
    }

    #[tokio::test]
    async fn deleting_a_question_drops_its_answers() {
        let (repo, q) = seeded().await;
        let ids = repo.create_answers(q, &args(&[("4", 10)])).await.unwrap();
        repo.delete_question(q).await.unwrap();

        assert!(matches!(repo.answer(ids[0]).await, Err(Error::NotFound(_))));
        assert!(matches!(
            repo.delete_question(q).await,
            Err(Error::NotFound(_))
        ));
    }
}
