//! Postgres-backed `QuizRepository`.
//!
//! The schema in `migrations/` is idempotent and applied on connect. Multi-row
//! writes run inside one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    PgConnection, PgPool, Row,
};

use quizbot_core::{
    domain::{
        Answer, AnswerArgs, AnswerId, Channel, ChannelId, NewQuestion, Question, QuestionId, Quiz,
        Role, User, UserId, UserResult,
    },
    errors::Error,
    store::{normalize_username, QuizRepository},
    Result,
};

const SCHEMA: &str = include_str!("../migrations/0001_schema.sql");

const QUESTION_COLUMNS: &str =
    "id, channel_id, created_by, created_at, question_text, image, is_sent";

trait DbResultExt<T> {
    fn db(self) -> Result<T>;
}

impl<T> DbResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn db(self) -> Result<T> {
        self.map_err(|e| match e {
            sqlx::Error::RowNotFound => Error::NotFound("row".to_string()),
            other => Error::Persistence(other.to_string()),
        })
    }
}

#[derive(Clone, Debug)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool and bring the schema up to date.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .db()?;
        let repo = Self::new(pool);
        repo.migrate().await?;
        Ok(repo)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await.db()?;
        tracing::info!("database schema ready");
        Ok(())
    }

    async fn lock_question(conn: &mut PgConnection, id: QuestionId) -> Result<()> {
        sqlx::query("SELECT id FROM questions WHERE id = $1 FOR UPDATE")
            .bind(id.0)
            .fetch_optional(&mut *conn)
            .await
            .db()?
            .ok_or_else(|| Error::NotFound(format!("question {id}")))?;
        Ok(())
    }

    async fn insert_answers(
        conn: &mut PgConnection,
        question: QuestionId,
        answers: &[AnswerArgs],
    ) -> Result<Vec<AnswerId>> {
        let mut ids = Vec::with_capacity(answers.len());
        for a in answers {
            let row = sqlx::query(
                "INSERT INTO answers (question_id, answer, cost) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(question.0)
            .bind(&a.answer)
            .bind(a.cost)
            .fetch_one(&mut *conn)
            .await
            .db()?;
            ids.push(AnswerId(row.try_get("id").db()?));
        }
        Ok(ids)
    }

    async fn update_question(&self, id: QuestionId, sql: &str, bind: Option<&str>) -> Result<()> {
        let mut query = sqlx::query(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let done = query.bind(id.0).execute(&self.pool).await.db()?;
        if done.rows_affected() == 0 {
            return Err(Error::NotFound(format!("question {id}")));
        }
        Ok(())
    }
}

fn role_to_db(role: Role) -> i16 {
    match role {
        Role::User => 0,
        Role::Admin => 1,
        Role::SuperAdmin => 2,
    }
}

fn role_from_db(raw: i16) -> Role {
    match raw {
        2 => Role::SuperAdmin,
        1 => Role::Admin,
        _ => Role::User,
    }
}

fn user_from_row(row: &PgRow) -> Result<User> {
    Ok(User {
        id: UserId(row.try_get("id").db()?),
        username: row.try_get("username").db()?,
        role: role_from_db(row.try_get("role").db()?),
    })
}

fn channel_from_row(row: &PgRow) -> Result<Channel> {
    Ok(Channel {
        id: ChannelId(row.try_get("id").db()?),
        title: row.try_get("title").db()?,
    })
}

fn question_from_row(row: &PgRow) -> Result<Question> {
    let created_at: DateTime<Utc> = row.try_get("created_at").db()?;
    Ok(Question {
        id: QuestionId(row.try_get("id").db()?),
        channel_id: ChannelId(row.try_get("channel_id").db()?),
        created_by: UserId(row.try_get("created_by").db()?),
        created_at,
        text: row.try_get("question_text").db()?,
        image: row.try_get("image").db()?,
        is_sent: row.try_get("is_sent").db()?,
    })
}

fn answer_from_row(row: &PgRow) -> Result<Answer> {
    Ok(Answer {
        id: AnswerId(row.try_get("id").db()?),
        question_id: QuestionId(row.try_get("question_id").db()?),
        text: row.try_get("answer").db()?,
        cost: row.try_get("cost").db()?,
    })
}

#[async_trait]
impl QuizRepository for PgRepository {
    async fn upsert_user(&self, id: UserId, username: Option<&str>) -> Result<User> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (id, username) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET username = COALESCE(EXCLUDED.username, users.username)
            RETURNING id, username, role
            "#,
        )
        .bind(id.0)
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .db()?;
        user_from_row(&row)
    }

    async fn role_of(&self, id: UserId) -> Result<Role> {
        let row = sqlx::query("SELECT role FROM users WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .db()?;
        match row {
            Some(row) => Ok(role_from_db(row.try_get("role").db()?)),
            None => Ok(Role::User),
        }
    }

    async fn set_role_by_username(&self, username: &str, role: Role) -> Result<User> {
        let wanted = normalize_username(username);
        if wanted.is_empty() {
            return Err(Error::InvalidInput("empty username".to_string()));
        }

        let row = sqlx::query(
            r#"
            UPDATE users SET role = $2
            WHERE id = (
                SELECT id FROM users
                WHERE lower(ltrim(btrim(username), '@')) = $1
                ORDER BY id
                LIMIT 1
            )
            RETURNING id, username, role
            "#,
        )
        .bind(&wanted)
        .bind(role_to_db(role))
        .fetch_optional(&self.pool)
        .await
        .db()?
        .ok_or_else(|| Error::NotFound(format!("user @{wanted}")))?;
        user_from_row(&row)
    }

    async fn admins(&self) -> Result<Vec<User>> {
        sqlx::query("SELECT id, username, role FROM users WHERE role >= $1 ORDER BY id")
            .bind(role_to_db(Role::Admin))
            .fetch_all(&self.pool)
            .await
            .db()?
            .iter()
            .map(user_from_row)
            .collect()
    }

    async fn upsert_channel(&self, channel: Channel) -> Result<()> {
        sqlx::query(
            "INSERT INTO channels (id, title) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET title = EXCLUDED.title",
        )
        .bind(channel.id.0)
        .bind(&channel.title)
        .execute(&self.pool)
        .await
        .db()?;
        Ok(())
    }

    async fn remove_channel(&self, id: ChannelId) -> Result<()> {
        sqlx::query("DELETE FROM channels WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .db()?;
        Ok(())
    }

    async fn channel(&self, id: ChannelId) -> Result<Channel> {
        let row = sqlx::query("SELECT id, title FROM channels WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .db()?
            .ok_or_else(|| Error::NotFound(format!("channel {id}")))?;
        channel_from_row(&row)
    }

    async fn channels(&self) -> Result<Vec<Channel>> {
        sqlx::query("SELECT id, title FROM channels ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .db()?
            .iter()
            .map(channel_from_row)
            .collect()
    }

    async fn create_question(&self, question: NewQuestion) -> Result<QuestionId> {
        let row = sqlx::query(
            r#"
            INSERT INTO questions (channel_id, created_by, question_text)
            SELECT $1, $2, $3 WHERE EXISTS (SELECT 1 FROM channels WHERE id = $1)
            RETURNING id
            "#,
        )
        .bind(question.channel_id.0)
        .bind(question.created_by.0)
        .bind(&question.text)
        .fetch_optional(&self.pool)
        .await
        .db()?
        .ok_or_else(|| Error::NotFound(format!("channel {}", question.channel_id)))?;
        Ok(QuestionId(row.try_get("id").db()?))
    }

    async fn question(&self, id: QuestionId) -> Result<Question> {
        let row = sqlx::query(&format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .db()?
            .ok_or_else(|| Error::NotFound(format!("question {id}")))?;
        question_from_row(&row)
    }

    async fn questions_by_channel(&self, channel: ChannelId) -> Result<Vec<Question>> {
        sqlx::query(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE channel_id = $1 ORDER BY id"
        ))
        .bind(channel.0)
        .fetch_all(&self.pool)
        .await
        .db()?
        .iter()
        .map(question_from_row)
        .collect()
    }

    async fn rename_question(&self, id: QuestionId, text: &str) -> Result<()> {
        self.update_question(
            id,
            "UPDATE questions SET question_text = $1 WHERE id = $2",
            Some(text),
        )
        .await
    }

    async fn set_image(&self, id: QuestionId, file_id: &str) -> Result<()> {
        self.update_question(id, "UPDATE questions SET image = $1 WHERE id = $2", Some(file_id))
            .await
    }

    async fn mark_sent(&self, id: QuestionId) -> Result<()> {
        self.update_question(id, "UPDATE questions SET is_sent = true WHERE id = $1", None)
            .await
    }

    async fn delete_question(&self, id: QuestionId) -> Result<()> {
        self.update_question(id, "DELETE FROM questions WHERE id = $1", None)
            .await
    }

    async fn answers_exist(&self, question: QuestionId) -> Result<bool> {
        self.question(question).await?;
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM answers WHERE question_id = $1) AS found")
            .bind(question.0)
            .fetch_one(&self.pool)
            .await
            .db()?;
        row.try_get("found").db()
    }

    async fn create_answers(
        &self,
        question: QuestionId,
        answers: &[AnswerArgs],
    ) -> Result<Vec<AnswerId>> {
        let mut tx = self.pool.begin().await.db()?;
        Self::lock_question(&mut tx, question).await?;
        let ids = Self::insert_answers(&mut tx, question, answers).await?;
        tx.commit().await.db()?;
        Ok(ids)
    }

    async fn replace_answers(
        &self,
        question: QuestionId,
        answers: &[AnswerArgs],
    ) -> Result<Vec<AnswerId>> {
        let mut tx = self.pool.begin().await.db()?;
        Self::lock_question(&mut tx, question).await?;
        sqlx::query("DELETE FROM answers WHERE question_id = $1")
            .bind(question.0)
            .execute(&mut *tx)
            .await
            .db()?;
        let ids = Self::insert_answers(&mut tx, question, answers).await?;
        tx.commit().await.db()?;
        Ok(ids)
    }

    async fn answer(&self, id: AnswerId) -> Result<Answer> {
        let row = sqlx::query("SELECT id, question_id, answer, cost FROM answers WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .db()?
            .ok_or_else(|| Error::NotFound(format!("answer {id}")))?;
        answer_from_row(&row)
    }

    async fn quiz(&self, question: QuestionId) -> Result<Quiz> {
        let q = self.question(question).await?;
        let answers = sqlx::query(
            "SELECT id, question_id, answer, cost FROM answers WHERE question_id = $1 ORDER BY id",
        )
        .bind(question.0)
        .fetch_all(&self.pool)
        .await
        .db()?
        .iter()
        .map(answer_from_row)
        .collect::<Result<Vec<_>>>()?;
        Ok(Quiz {
            question: q,
            answers,
        })
    }

    async fn has_answered(&self, user: UserId, question: QuestionId) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM user_results WHERE user_id = $1 AND question_id = $2) AS found",
        )
        .bind(user.0)
        .bind(question.0)
        .fetch_one(&self.pool)
        .await
        .db()?;
        row.try_get("found").db()
    }

    async fn record_answer(&self, user: UserId, answer: AnswerId) -> Result<i64> {
        let picked = self.answer(answer).await?;
        let row = sqlx::query(
            r#"
            INSERT INTO user_results (user_id, question_id, points) VALUES ($1, $2, $3)
            ON CONFLICT (user_id, question_id) DO NOTHING
            RETURNING points
            "#,
        )
        .bind(user.0)
        .bind(picked.question_id.0)
        .bind(picked.cost)
        .fetch_optional(&self.pool)
        .await
        .db()?
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "user {} already answered question {}",
                user.0, picked.question_id
            ))
        })?;
        row.try_get("points").db()
    }

    async fn results_by_channel(&self, channel: ChannelId) -> Result<Vec<UserResult>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.user_id, COALESCE(u.username, '') AS username, r.points,
                   q.id AS question_id, q.question_text
            FROM user_results r
            JOIN questions q ON q.id = r.question_id
            LEFT JOIN users u ON u.id = r.user_id
            WHERE q.channel_id = $1
            ORDER BY r.id
            "#,
        )
        .bind(channel.0)
        .fetch_all(&self.pool)
        .await
        .db()?;

        rows.iter()
            .map(|row| {
                Ok(UserResult {
                    id: row.try_get("id").db()?,
                    user_id: row.try_get("user_id").db()?,
                    username: row.try_get("username").db()?,
                    points: row.try_get("points").db()?,
                    question_id: row.try_get("question_id").db()?,
                    question_text: row.try_get("question_text").db()?,
                })
            })
            .collect()
    }

    async fn reset_results(&self, channel: ChannelId) -> Result<()> {
        let done = sqlx::query(
            r#"
            UPDATE user_results r SET points = 0
            FROM questions q
            WHERE r.question_id = q.id AND q.channel_id = $1
            "#,
        )
        .bind(channel.0)
        .execute(&self.pool)
        .await
        .db()?;
        tracing::debug!(channel = channel.0, rows = done.rows_affected(), "results reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_survive_the_column_encoding() {
        for role in [Role::User, Role::Admin, Role::SuperAdmin] {
            assert_eq!(role_from_db(role_to_db(role)), role);
        }
        assert_eq!(role_from_db(7), Role::User);
    }

    #[test]
    fn missing_rows_read_as_not_found() {
        let err = Err::<(), _>(sqlx::Error::RowNotFound).db().unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = Err::<(), _>(sqlx::Error::PoolTimedOut).db().unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
    }

    /// Runs against `QUIZBOT_TEST_DATABASE_URL` when it is set.
    #[tokio::test]
    async fn quiz_lifecycle_against_a_live_database() {
        let Ok(url) = std::env::var("QUIZBOT_TEST_DATABASE_URL") else {
            return;
        };
        let repo = PgRepository::connect(&url, 2).await.unwrap();
        let seed = Utc::now().timestamp_micros();
        let channel = ChannelId(-seed);
        let user = UserId(seed);

        repo.upsert_channel(Channel {
            id: channel,
            title: "Trivia".to_string(),
        })
        .await
        .unwrap();
        repo.upsert_user(user, Some(format!("tester{seed}").as_str()))
            .await
            .unwrap();
        assert_eq!(
            repo.set_role_by_username(&format!("@Tester{seed}"), Role::Admin)
                .await
                .unwrap()
                .role,
            Role::Admin
        );

        let q = repo
            .create_question(NewQuestion {
                channel_id: channel,
                created_by: user,
                text: "<b>2+2?</b>".to_string(),
            })
            .await
            .unwrap();
        let args = |answer: &str, cost| AnswerArgs {
            answer: answer.to_string(),
            cost,
        };
        repo.create_answers(q, &[args("3", 0), args("5", 0)])
            .await
            .unwrap();
        let ids = repo.replace_answers(q, &[args("4", 10)]).await.unwrap();
        assert_eq!(repo.quiz(q).await.unwrap().answers.len(), 1);

        assert_eq!(repo.record_answer(user, ids[0]).await.unwrap(), 10);
        assert!(matches!(
            repo.record_answer(user, ids[0]).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(repo.has_answered(user, q).await.unwrap());

        repo.reset_results(channel).await.unwrap();
        let results = repo.results_by_channel(channel).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].points, 0);

        repo.delete_question(q).await.unwrap();
        assert!(matches!(repo.question(q).await, Err(Error::NotFound(_))));
        repo.remove_channel(channel).await.unwrap();
    }
}
