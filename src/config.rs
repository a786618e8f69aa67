//! Engine settings.
//!
//! Populated from CLI flags and their environment fallbacks (see
//! `cli::args`), then checked once with [`Settings::validate`] before any
//! remote call.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ReviewError, ReviewResult};

pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1/";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_TEMPERATURE: f64 = 0.2;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_STEP_RETRIEVAL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_UPLOAD_CHUNK_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_MAX_WORKERS: usize = 4;

pub const DEFAULT_DESCRIPTION: &str = "Code review assistant";
pub const DEFAULT_INSTRUCTIONS: &str = "You review code changes. Search the project files \
for context, call get_context to look up definitions you cannot find, and always answer \
through the format_replies function.";

/// Parameters that identify an assistant configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantParams {
    pub description: String,
    pub instructions: String,
    pub model: String,
    pub temperature: f64,
}

impl Default for AssistantParams {
    fn default() -> Self {
        Self {
            description: DEFAULT_DESCRIPTION.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base_url: String,
    pub api_key: String,
    pub assistant: AssistantParams,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    /// Fixed backoff between run-step retrieval attempts.
    pub step_retrieval_interval: Duration,
    pub upload_chunk_bytes: usize,
    /// Create a new assistant even when one is cached for the current parameters.
    pub force_new_assistant: bool,
    pub max_workers: usize,
    pub state_dir: PathBuf,
    pub project_root: PathBuf,
    pub project_name: String,
}

impl Settings {
    pub fn new(project_root: PathBuf, project_name: impl Into<String>, state_dir: PathBuf) -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: String::new(),
            assistant: AssistantParams::default(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            poll_timeout: Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS),
            step_retrieval_interval: Duration::from_secs(DEFAULT_STEP_RETRIEVAL_INTERVAL_SECS),
            upload_chunk_bytes: DEFAULT_UPLOAD_CHUNK_BYTES,
            force_new_assistant: false,
            max_workers: DEFAULT_MAX_WORKERS,
            state_dir,
            project_root,
            project_name: project_name.into(),
        }
    }

    /// Check settings that every command relies on.
    pub fn validate(&self) -> ReviewResult<()> {
        let temperature = self.assistant.temperature;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ReviewError::Config(format!(
                "temperature must be between 0 and 2, got {}",
                temperature
            )));
        }
        if self.assistant.model.trim().is_empty() {
            return Err(ReviewError::Config("model must not be empty".to_string()));
        }
        if self.poll_interval.is_zero() || self.poll_timeout.is_zero() {
            return Err(ReviewError::Config(
                "poll interval and poll timeout must be greater than zero".to_string(),
            ));
        }
        if self.step_retrieval_interval.is_zero() {
            return Err(ReviewError::Config(
                "step retrieval interval must be greater than zero".to_string(),
            ));
        }
        if self.upload_chunk_bytes == 0 {
            return Err(ReviewError::Config(
                "upload chunk size must be greater than zero".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(ReviewError::Config(
                "max workers must be at least 1".to_string(),
            ));
        }
        if self.project_name.trim().is_empty() {
            return Err(ReviewError::Config(
                "project name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Additional checks for commands that talk to the remote API.
    pub fn validate_remote(&self) -> ReviewResult<()> {
        self.validate()?;
        if self.api_key.trim().is_empty() {
            return Err(ReviewError::Config(
                "an API key is required (set --api-key or REVIEW_ASSISTANT_API_KEY)".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        let mut settings = Settings::new(PathBuf::from("."), "demo", PathBuf::from("/tmp/state"));
        settings.api_key = "sk-test".to_string();
        settings
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = settings();
        settings.validate_remote().unwrap();
        assert_eq!(settings.upload_chunk_bytes, 5 * 1024 * 1024);
        assert_eq!(settings.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_temperature_out_of_range() {
        let mut settings = settings();
        settings.assistant.temperature = 2.5;
        assert!(matches!(settings.validate(), Err(ReviewError::Config(_))));
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let mut settings = settings();
        settings.poll_interval = Duration::ZERO;
        assert!(settings.validate().is_err());

        let mut settings = self::settings();
        settings.step_retrieval_interval = Duration::ZERO;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_api_key_required_for_remote_commands() {
        let mut settings = settings();
        settings.api_key.clear();
        settings.validate().unwrap();
        assert!(matches!(
            settings.validate_remote(),
            Err(ReviewError::Config(_))
        ));
    }
}
