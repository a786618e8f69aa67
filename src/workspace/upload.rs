//! Chunked upload of project files.
//!
//! Files are packed in path order into chunks whose summed path and content
//! size stays under the configured byte limit. Each chunk is uploaded as one
//! JSON document, `<project>_<n>.json`, mapping relative path to content.
//! A single file larger than the limit gets a chunk of its own.

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::api::AssistantApi;
use crate::error::{ReviewError, ReviewResult};

use super::SourceFile;

fn file_size(file: &SourceFile) -> usize {
    file.path.len() + file.content.len()
}

/// Split files into chunks bounded by `max_bytes`.
pub fn pack_into_chunks(files: &[SourceFile], max_bytes: usize) -> Vec<Vec<SourceFile>> {
    let mut chunks = Vec::new();
    let mut current_chunk = Vec::new();
    let mut current_bytes = 0usize;

    for file in files {
        let size = file_size(file);

        if current_bytes + size > max_bytes && !current_chunk.is_empty() {
            chunks.push(current_chunk);
            current_chunk = Vec::new();
            current_bytes = 0;
        }

        current_chunk.push(file.clone());
        current_bytes += size;
    }

    if !current_chunk.is_empty() {
        chunks.push(current_chunk);
    }

    chunks
}

/// Name of the `index`-th uploaded document of a project.
///
/// Path separators in the project name become `_` so the name stays a
/// single file name.
pub fn chunk_filename(project: &str, index: usize) -> String {
    let project = project.replace(['/', '\\', ':'], "_");
    format!("{}_{}.json", project, index)
}

/// Serialize a chunk as `{"<path>": "<content>", ...}`.
pub fn chunk_document(chunk: &[SourceFile]) -> ReviewResult<Vec<u8>> {
    let document: BTreeMap<&str, &str> = chunk
        .iter()
        .map(|file| (file.path.as_str(), file.content.as_str()))
        .collect();
    serde_json::to_vec(&document)
        .map_err(|e| ReviewError::InvalidState(format!("failed to encode upload chunk: {}", e)))
}

/// Upload every file of the project and return the remote file ids in chunk order.
pub async fn upload_project_files(
    api: &dyn AssistantApi,
    project: &str,
    files: &[SourceFile],
    max_bytes: usize,
) -> ReviewResult<Vec<String>> {
    if files.is_empty() {
        return Err(ReviewError::Config(format!(
            "project {} has no files to upload",
            project
        )));
    }

    let chunks = pack_into_chunks(files, max_bytes);
    let total = chunks.len();
    let mut file_ids = Vec::with_capacity(total);

    for (index, chunk) in chunks.iter().enumerate() {
        let filename = chunk_filename(project, index);
        let document = chunk_document(chunk)?;
        debug!(
            "Uploading {} ({} files, {} bytes)",
            filename,
            chunk.len(),
            document.len()
        );

        let uploaded = api.upload_file(&filename, document).await?;
        file_ids.push(uploaded.id);
    }

    info!(
        "📤 Uploaded {} files for project {} in {} document(s)",
        files.len(),
        project,
        total
    );

    Ok(file_ids)
}
