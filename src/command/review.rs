use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Settings;
use crate::review::{ReviewContext, ReviewSession};

/// Prompt from `--prompt`, or the contents of `--prompt-file`.
pub fn read_prompt(prompt: Option<String>, prompt_file: Option<PathBuf>) -> Result<String> {
    let prompt = match (prompt, prompt_file) {
        (Some(prompt), _) => prompt,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read prompt file {}", path.display()))?,
        (None, None) => anyhow::bail!("A prompt is required (--prompt or --prompt-file)"),
    };
    if prompt.trim().is_empty() {
        anyhow::bail!("The prompt is empty");
    }
    Ok(prompt)
}

pub async fn run_review(
    settings: Settings,
    context: ReviewContext,
    prompt: String,
    cancel: CancellationToken,
) -> Result<()> {
    settings.validate_remote()?;
    let session = ReviewSession::from_settings(settings)?;

    info!("🔍 Reviewing change {}", context.change_id);
    let response = session
        .ask(&context, &prompt, &cancel)
        .await
        .with_context(|| format!("Review of change {} failed", context.change_id))?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
