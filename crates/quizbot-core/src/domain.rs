use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

impl MessageRef {
    pub fn new(chat_id: ChatId, message_id: MessageId) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

/// Channel identity. This is the channel's chat id, so it can be used to post directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuestionId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnswerId(pub i64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AnswerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access level. Ordered: a higher role satisfies every lower requirement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    #[default]
    User,
    Admin,
    SuperAdmin,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: Option<String>,
    pub role: Role,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question {
    pub id: QuestionId,
    pub channel_id: ChannelId,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    /// Telegram HTML, as rendered from the admin's message.
    pub text: String,
    /// Transport file id of the attached image, if any.
    pub image: Option<String>,
    pub is_sent: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewQuestion {
    pub channel_id: ChannelId,
    pub created_by: UserId,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Answer {
    pub id: AnswerId,
    pub question_id: QuestionId,
    pub text: String,
    pub cost: i64,
}

/// A question together with its answer options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quiz {
    pub question: Question,
    pub answers: Vec<Answer>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserResult {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub points: i64,
    pub question_id: i64,
    pub question_text: String,
}

/// One answer option as admins type it in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerArgs {
    pub answer: String,
    pub cost: i64,
}

/// The JSON document admins send to create or replace a question's answers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSet {
    pub answers: Vec<AnswerArgs>,
}

impl AnswerSet {
    pub fn from_answers(answers: &[Answer]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|a| AnswerArgs {
                    answer: a.text.clone(),
                    cost: a.cost,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering() {
        assert!(Role::SuperAdmin > Role::Admin);
        assert!(Role::Admin > Role::User);
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn answer_set_parses_admin_json() {
        let raw = r#"{"answers":[{"answer":"Four","cost":10},{"answer":"Five","cost":0}]}"#;
        let set: AnswerSet = serde_json::from_str(raw).unwrap();
        assert_eq!(set.answers.len(), 2);
        assert_eq!(set.answers[0].answer, "Four");
        assert_eq!(set.answers[1].cost, 0);
    }
}
