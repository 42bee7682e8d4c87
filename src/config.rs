use std::{fs, num::ParseIntError, path::PathBuf, sync::Arc, time::Duration};

use thiserror::Error;

use crate::quiz::{
    controller::DEFAULT_RESET_DELAY, BankError, Question, QuestionBank, DEFAULT_RESULT_MESSAGES,
};

pub const PROJECT_TITLE: &str = "Art Showcased Frame";
pub const PROJECT_DESCRIPTION: &str = "Interactive quiz about Maschine capabilities";

const RESET_DELAY_VAR: &str = "QUIZ_RESET_DELAY_MS";
const BANK_PATH_VAR: &str = "QUIZ_BANK_PATH";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("QUIZ_RESET_DELAY_MS must be a number of milliseconds, got {value:?}")]
    InvalidDelay {
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("Failed to read the question bank at {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse the question bank")]
    Json(#[from] serde_json::Error),
    #[error("Invalid question bank: {0}")]
    Bank(#[from] BankError),
}

/// On-disk form of a question bank.
#[derive(Debug, serde::Deserialize)]
struct BankFile {
    title: Option<String>,
    description: Option<String>,
    questions: Vec<Question>,
    #[serde(default)]
    result_messages: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FrameConfig {
    pub title: String,
    pub description: String,
    pub bank: Arc<QuestionBank>,
    pub result_messages: Vec<String>,
    pub reset_delay: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            title: PROJECT_TITLE.to_string(),
            description: PROJECT_DESCRIPTION.to_string(),
            bank: Arc::new(QuestionBank::default()),
            result_messages: DEFAULT_RESULT_MESSAGES
                .iter()
                .map(|m| m.to_string())
                .collect(),
            reset_delay: DEFAULT_RESET_DELAY,
        }
    }
}

impl FrameConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(
            std::env::var(RESET_DELAY_VAR).ok().as_deref(),
            std::env::var(BANK_PATH_VAR).ok().as_deref(),
        )
    }

    fn from_vars(
        reset_delay: Option<&str>,
        bank_path: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let mut config = match bank_path {
            Some(path) => {
                let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: PathBuf::from(path),
                    source,
                })?;
                Self::from_bank_json(&json)?
            }
            None => Self::default(),
        };

        if let Some(value) = reset_delay {
            let millis: u64 = value
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidDelay {
                    value: value.to_string(),
                    source,
                })?;
            config.reset_delay = Duration::from_millis(millis);
        }

        Ok(config)
    }

    /// Builds a config around a JSON question bank; missing fields keep their defaults.
    pub fn from_bank_json(json: &str) -> Result<Self, ConfigError> {
        let file: BankFile = serde_json::from_str(json)?;
        let defaults = Self::default();

        Ok(Self {
            title: file.title.unwrap_or(defaults.title),
            description: file.description.unwrap_or(defaults.description),
            bank: Arc::new(QuestionBank::new(file.questions)?),
            result_messages: if file.result_messages.is_empty() {
                defaults.result_messages
            } else {
                file.result_messages
            },
            reset_delay: defaults.reset_delay,
        })
    }

    /// Text the frame's anchor message shows once it has loaded.
    pub fn ready_text(&self) -> String {
        format!("{}\n{}", self.title, self.description)
    }
}
