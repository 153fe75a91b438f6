/// Core error type for the quiz bot.
///
/// Adapter crates map their specific errors into this type so the router can
/// decide what the user sees (button acknowledgement or chat message) and what
/// only goes to the log.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Short text shown to the chat user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "The requested item no longer exists.",
            Error::InvalidInput(_) => "Invalid input. Please start again from the menu.",
            Error::PermissionDenied => "Insufficient permission.",
            Error::Persistence(_) => "Storage error. Please start again from the menu.",
            _ => "Internal error. Please try again later.",
        }
    }

    /// Errors that end the current dispatch without being worth an error-level log line.
    pub fn is_terminal_for_user(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::InvalidInput(_) | Error::PermissionDenied
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
