use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration, read from the environment (and `.env` when present).
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    /// Bootstrap super-admins; they pass every role check.
    pub admins: Vec<i64>,

    // Storage
    /// Postgres connection string. Unset means in-memory storage.
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    // Export
    pub export_path: PathBuf,
    pub export_timeout: Duration,

    // Pending operations
    pub pending_ttl: Option<Duration>,

    // Telegram limits
    pub button_label_max_length: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let admins = parse_csv_i64(env_str("QUIZBOT_ADMINS"));
        if admins.is_empty() {
            tracing::warn!("QUIZBOT_ADMINS is empty; only users promoted in storage can manage quizzes");
        }

        let database_url = env_str("DATABASE_URL").filter(|u| !u.trim().is_empty());
        let database_max_connections = env_u64("DATABASE_MAX_CONNECTIONS")
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(5)
            .max(1);

        let export_path = PathBuf::from(
            env_str("EXPORT_PATH").unwrap_or("/tmp/quizbot-results.csv".to_string()),
        );
        if let Some(parent) = export_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let export_timeout = Duration::from_secs(env_u64("EXPORT_TIMEOUT_SECS").unwrap_or(120));

        let pending_ttl = match env_u64("PENDING_TTL_SECS").unwrap_or(0) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let button_label_max_length = env_usize("BUTTON_LABEL_MAX_LENGTH").unwrap_or(24).max(4);

        Ok(Self {
            telegram_bot_token,
            admins,
            database_url,
            database_max_connections,
            export_path,
            export_timeout,
            pending_ttl,
            button_label_max_length,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_ids_skip_garbage() {
        assert_eq!(
            parse_csv_i64(Some(" 12, ,abc,-100200,7 ".to_string())),
            vec![12, -100200, 7]
        );
        assert!(parse_csv_i64(None).is_empty());
    }

    #[test]
    fn dotenv_lines_are_parsed() {
        let parsed = parse_dotenv(
            "# comment\nTELEGRAM_BOT_TOKEN=\"123:abc\"\n\nEXPORT_PATH='/tmp/x.csv'\nnonsense\n=nokey\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("TELEGRAM_BOT_TOKEN".to_string(), "123:abc".to_string()),
                ("EXPORT_PATH".to_string(), "/tmp/x.csv".to_string()),
            ]
        );
    }
}
