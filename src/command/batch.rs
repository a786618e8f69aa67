use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::ReviewError;
use crate::review::{ResponseContent, ReviewPool, ReviewRequest, ReviewSession};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchOutcome<'a> {
    change_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<&'a ResponseContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Error message followed by its source chain.
fn describe(err: &ReviewError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

pub fn load_requests(path: &Path) -> Result<Vec<ReviewRequest>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Request file {} is not a JSON array of reviews", path.display()))
}

pub async fn run_batch(settings: Settings, requests_path: &Path, cancel: CancellationToken) -> Result<()> {
    settings.validate_remote()?;
    let requests = load_requests(requests_path)?;
    if requests.is_empty() {
        println!("No review requests in {}", requests_path.display());
        return Ok(());
    }

    let max_workers = settings.max_workers;
    let session = ReviewSession::from_settings(settings)?;
    let pool = ReviewPool::new(session, max_workers, cancel);
    let results = pool.run_all(requests.clone()).await;

    let outcomes: Vec<BatchOutcome<'_>> = requests
        .iter()
        .zip(&results)
        .map(|(request, result)| BatchOutcome {
            change_id: &request.context.change_id,
            response: result.as_ref().ok(),
            error: result.as_ref().err().map(describe),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&outcomes)?);

    let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} review(s) failed", failed, outcomes.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_requests() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("requests.json");
        std::fs::write(
            &path,
            r#"[{"changeId":"1","prompt":"a"},{"changeId":"2","prompt":"b","forceNewAssistant":true}]"#,
        )
        .unwrap();

        let requests = load_requests(&path).unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].context.force_new_assistant);

        std::fs::write(&path, r#"{"changeId":"1"}"#).unwrap();
        assert!(load_requests(&path).is_err());
    }

    #[test]
    fn test_describe_includes_sources() {
        let err = ReviewError::connection_caused_by(
            "failed to retrieve run steps after 3 attempts",
            ReviewError::connection("connection reset"),
        );
        assert_eq!(
            describe(&err),
            "failed to retrieve run steps after 3 attempts: connection reset"
        );
    }
}
