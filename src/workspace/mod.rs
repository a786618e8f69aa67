//! Project source collection for the vector store.
//!
//! Scans the project tree and uploads its files in byte-bounded JSON
//! documents that the assistant's file search indexes.

mod scanner;
mod upload;

use std::path::PathBuf;

use crate::error::{ReviewError, ReviewResult};

pub use scanner::{scan_project, SourceFile};
pub use upload::{chunk_filename, pack_into_chunks, upload_project_files};

/// Scan the project on the blocking pool.
pub async fn collect_project_files(root: PathBuf) -> ReviewResult<Vec<SourceFile>> {
    tokio::task::spawn_blocking(move || scan_project(&root))
        .await
        .map_err(|e| ReviewError::InvalidState(format!("project scan task failed: {}", e)))
}
