use anyhow::{Context, Result};

use crate::config::Settings;
use crate::review::ReviewSession;

pub fn run_merged(settings: Settings, change_id: &str) -> Result<()> {
    let project = settings.project_name.clone();
    let session = ReviewSession::from_settings(settings)?;

    session
        .change_merged(change_id)
        .with_context(|| format!("Failed to flush cached ids for {}", project))?;

    println!("✅ Flushed assistant and vector store ids for {}", project);
    println!("   The next review builds a fresh vector store.");
    Ok(())
}
