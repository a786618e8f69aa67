use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{
    Settings, DEFAULT_API_BASE_URL, DEFAULT_DESCRIPTION, DEFAULT_INSTRUCTIONS,
    DEFAULT_MAX_WORKERS, DEFAULT_MODEL, DEFAULT_POLL_INTERVAL_MS, DEFAULT_POLL_TIMEOUT_SECS,
    DEFAULT_STEP_RETRIEVAL_INTERVAL_SECS, DEFAULT_TEMPERATURE, DEFAULT_UPLOAD_CHUNK_BYTES,
};

/// Review assistant - code review through a stateful assistants API
#[derive(Parser)]
#[command(name = "review-assistant")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root (auto-detects git root if absent)
    #[arg(short = 'w', long, global = true, env = "REVIEW_ASSISTANT_WORKSPACE_ROOT")]
    pub workspace_root: Option<String>,

    /// Project name used to scope cached state (defaults to the root directory name)
    #[arg(short = 'p', long, global = true, env = "REVIEW_ASSISTANT_PROJECT")]
    pub project: Option<String>,

    /// Directory for persisted ids. Defaults to ~/.review-assistant
    #[arg(long, global = true, env = "REVIEW_ASSISTANT_STATE_DIR")]
    pub state_dir: Option<String>,

    #[command(flatten)]
    pub engine: EngineArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Remote API and engine tuning.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// API key for the assistants API
    #[arg(long, env = "REVIEW_ASSISTANT_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Base URL of the assistants API
    #[arg(long, env = "REVIEW_ASSISTANT_BASE_URL", default_value = DEFAULT_API_BASE_URL, global = true)]
    pub base_url: String,

    /// Model for newly created assistants
    #[arg(short = 'm', long, env = "REVIEW_ASSISTANT_MODEL", default_value = DEFAULT_MODEL, global = true)]
    pub model: String,

    /// Sampling temperature (0 to 2)
    #[arg(long, env = "REVIEW_ASSISTANT_TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE, global = true)]
    pub temperature: f64,

    /// Assistant description
    #[arg(long, env = "REVIEW_ASSISTANT_DESCRIPTION", default_value = DEFAULT_DESCRIPTION, global = true)]
    pub description: String,

    /// Assistant instructions
    #[arg(long, env = "REVIEW_ASSISTANT_INSTRUCTIONS", default_value = DEFAULT_INSTRUCTIONS, global = true, hide_default_value = true)]
    pub instructions: String,

    /// Delay between status polls, in milliseconds
    #[arg(long, env = "REVIEW_ASSISTANT_POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL_MS, global = true)]
    pub poll_interval_ms: u64,

    /// Give up waiting on a run or file batch after this many seconds
    #[arg(long, env = "REVIEW_ASSISTANT_POLL_TIMEOUT_SECS", default_value_t = DEFAULT_POLL_TIMEOUT_SECS, global = true)]
    pub poll_timeout_secs: u64,

    /// Delay between run step retrieval attempts, in seconds
    #[arg(long, env = "REVIEW_ASSISTANT_STEP_INTERVAL_SECS", default_value_t = DEFAULT_STEP_RETRIEVAL_INTERVAL_SECS, global = true)]
    pub step_interval_secs: u64,

    /// Upper bound for one uploaded source chunk, in bytes
    #[arg(long, env = "REVIEW_ASSISTANT_UPLOAD_CHUNK_BYTES", default_value_t = DEFAULT_UPLOAD_CHUNK_BYTES, global = true)]
    pub upload_chunk_bytes: usize,

    /// Maximum concurrent reviews in batch mode
    #[arg(long, env = "REVIEW_ASSISTANT_MAX_WORKERS", default_value_t = DEFAULT_MAX_WORKERS, global = true)]
    pub max_workers: usize,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask the assistant to review one change
    Review {
        /// Change identifier; scopes the conversation thread
        #[arg(short, long)]
        change: String,

        /// Prompt text
        #[arg(long, conflicts_with = "prompt_file", required_unless_present = "prompt_file")]
        prompt: Option<String>,

        /// Read the prompt from a file
        #[arg(long)]
        prompt_file: Option<PathBuf>,

        /// Start a new thread instead of continuing the change's thread
        #[arg(long)]
        fresh: bool,

        /// Create a new assistant even when one is cached
        #[arg(long)]
        force_new_assistant: bool,
    },
    /// Review several changes concurrently from a JSON request file
    Batch {
        /// JSON array of {"changeId", "prompt", "forceFreshThread"?, "forceNewAssistant"?}
        #[arg(short, long)]
        requests: PathBuf,
    },
    /// Forget the project's assistant and vector store after a merge
    Merged {
        /// Change identifier whose assistant log is cleared
        #[arg(short, long)]
        change: String,
    },
    /// Show the ids cached for the project
    Status {
        /// Also show the thread of this change
        #[arg(short, long)]
        change: Option<String>,
    },
    /// Preview files that will be uploaded (dry-run)
    Preview {
        /// Show all files (not just summary)
        #[arg(short = 'a', long)]
        all: bool,
    },
}

impl EngineArgs {
    pub fn into_settings(self, project_root: PathBuf, project_name: String, state_dir: PathBuf) -> Settings {
        let mut settings = Settings::new(project_root, project_name, state_dir);
        settings.api_base_url = self.base_url;
        settings.api_key = self.api_key.unwrap_or_default();
        settings.assistant.model = self.model;
        settings.assistant.temperature = self.temperature;
        settings.assistant.description = self.description;
        settings.assistant.instructions = self.instructions;
        settings.poll_interval = Duration::from_millis(self.poll_interval_ms);
        settings.poll_timeout = Duration::from_secs(self.poll_timeout_secs);
        settings.step_retrieval_interval = Duration::from_secs(self.step_interval_secs);
        settings.upload_chunk_bytes = self.upload_chunk_bytes;
        settings.max_workers = self.max_workers;
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_review_flags_map_into_settings() {
        let cli = Cli::try_parse_from([
            "review-assistant",
            "--model",
            "gpt-4.1",
            "--temperature",
            "0.5",
            "--step-interval-secs",
            "3",
            "review",
            "--change",
            "42",
            "--prompt",
            "Check this",
            "--fresh",
        ])
        .unwrap();

        match &cli.command {
            Some(Commands::Review { change, prompt, fresh, .. }) => {
                assert_eq!(change, "42");
                assert_eq!(prompt.as_deref(), Some("Check this"));
                assert!(*fresh);
            }
            _ => panic!("expected review command"),
        }

        let settings =
            cli.engine
                .into_settings(PathBuf::from("/tmp/p"), "p".to_string(), PathBuf::from("/tmp/s"));
        assert_eq!(settings.assistant.model, "gpt-4.1");
        assert_eq!(settings.assistant.temperature, 0.5);
        assert_eq!(settings.step_retrieval_interval, Duration::from_secs(3));
        assert_eq!(settings.max_workers, DEFAULT_MAX_WORKERS);
    }

    #[test]
    fn test_review_requires_a_prompt() {
        let result = Cli::try_parse_from(["review-assistant", "review", "--change", "42"]);
        assert!(result.is_err());
    }
}
