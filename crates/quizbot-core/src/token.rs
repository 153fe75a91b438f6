//! Command tokens carried inside button payloads.
//!
//! Grammar: `<noun>_<verb>[_<argument>]`. The command name is always the first
//! two `_`-separated segments and the argument, when present, is the third.
//! A payload with more segments than that still yields its name but carries no
//! argument, so handlers that need one report it as missing.
//!
//! Arguments are usually a single integer id. When a button needs more than
//! one id, the argument is a query string (`questionID=7&channelID=3`)
//! percent-encoded into one segment: `channel_get_questionID%3D7%26channelID%3D3`.

use std::collections::HashMap;

use url::form_urlencoded;

use crate::{
    domain::{AnswerId, ChannelId, QuestionId},
    errors::Error,
    Result,
};

pub const SEPARATOR: char = '_';

const NAME_SEGMENTS: usize = 2;
const MAX_SEGMENTS: usize = NAME_SEGMENTS + 1;

const QUESTION_KEY: &str = "questionID";
const CHANNEL_KEY: &str = "channelID";

/// Decoded `(name, argument)` pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandToken {
    pub name: String,
    pub argument: Option<String>,
}

impl CommandToken {
    pub fn new(name: impl Into<String>, argument: Option<String>) -> Self {
        Self {
            name: name.into(),
            argument,
        }
    }

    pub fn decode(payload: &str) -> Self {
        let parts: Vec<&str> = payload.split(SEPARATOR).collect();
        if parts.len() < NAME_SEGMENTS {
            return Self::new(payload, None);
        }

        let name = parts[..NAME_SEGMENTS].join("_");
        let argument = if parts.len() == MAX_SEGMENTS {
            Some(parts[NAME_SEGMENTS])
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        } else {
            None
        };

        Self { name, argument }
    }

    pub fn encode(&self) -> String {
        encode(&self.name, self.argument.as_deref())
    }

    /// Positive integer argument, if any. Zero counts as missing.
    pub fn id(&self) -> Option<i64> {
        self.argument
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|id| *id != 0)
    }

    fn require_id(&self) -> Result<i64> {
        self.id().ok_or_else(|| {
            Error::NotFound(format!("no id in button payload `{}`", self.encode()))
        })
    }

    pub fn question_id(&self) -> Result<QuestionId> {
        self.require_id().map(QuestionId)
    }

    pub fn channel_id(&self) -> Result<ChannelId> {
        self.require_id().map(ChannelId)
    }

    pub fn answer_id(&self) -> Result<AnswerId> {
        self.require_id().map(AnswerId)
    }

    pub fn composite(&self) -> Result<CompositeArgument> {
        let raw = self.argument.as_deref().ok_or_else(|| {
            Error::NotFound(format!("no argument in button payload `{}`", self.encode()))
        })?;
        CompositeArgument::decode(raw)
    }
}

pub fn encode(name: &str, argument: Option<&str>) -> String {
    match argument {
        Some(arg) => format!("{name}{SEPARATOR}{arg}"),
        None => name.to_string(),
    }
}

/// Convenience for the common "name + integer id" button.
pub fn encode_id(name: &str, id: impl std::fmt::Display) -> String {
    encode(name, Some(&id.to_string()))
}

/// Question + channel pair packed into one argument segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositeArgument {
    pub question_id: QuestionId,
    pub channel_id: ChannelId,
}

impl CompositeArgument {
    pub fn encode(&self) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair(QUESTION_KEY, &self.question_id.to_string())
            .append_pair(CHANNEL_KEY, &self.channel_id.to_string())
            .finish();
        form_urlencoded::byte_serialize(query.as_bytes()).collect()
    }

    pub fn decode(raw: &str) -> Result<Self> {
        // The segment is normally percent-encoded; accept a bare query string too.
        let query = if raw.contains('=') {
            raw.to_string()
        } else {
            form_urlencoded::parse(raw.as_bytes())
                .map(|(k, _)| k.into_owned())
                .next()
                .unwrap_or_default()
        };

        let pairs: HashMap<String, String> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        let field = |key: &str| -> Result<i64> {
            pairs
                .get(key)
                .and_then(|v| v.parse::<i64>().ok())
                .ok_or_else(|| Error::InvalidInput(format!("missing `{key}` in `{query}`")))
        };

        Ok(Self {
            question_id: QuestionId(field(QUESTION_KEY)?),
            channel_id: ChannelId(field(CHANNEL_KEY)?),
        })
    }
}
