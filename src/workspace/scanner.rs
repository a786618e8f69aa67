//! Source file scanning for vector store uploads.
//!
//! Uses `ignore::WalkBuilder` for recursive .gitignore support, layered with:
//! 1. DEFAULT_SENSITIVE_RULES (credentials and keys, never uploaded)
//! 2. DEFAULT_IGNORED_DIRS (build output and dependency folders)
//! 3. .reviewignore at any level (same syntax as .gitignore)

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Maximum file size to read (1MB).
/// Files larger than this are skipped.
pub const MAX_READABLE_FILE_SIZE: u64 = 1024 * 1024;

pub const REVIEW_IGNORE_FILENAME: &str = ".reviewignore";

/// Glob patterns for files that must never leave the machine.
pub const DEFAULT_SENSITIVE_RULES: &[&str] = &[
    ".env",
    ".env.*",
    "*.pem",
    "*.key",
    "*.p12",
    "*.pfx",
    "*.keystore",
    "*.jks",
    "id_rsa*",
    "id_ed25519*",
    "id_ecdsa*",
    ".npmrc",
    ".pypirc",
    ".netrc",
    "credentials.json",
    "*.tfstate",
    "*.tfstate.*",
];

/// Directory names skipped wherever they appear.
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "build",
    "dist",
    "out",
    "vendor",
    "__pycache__",
    ".venv",
    ".idea",
    ".vscode",
];

/// A readable UTF-8 source file, keyed by its path relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

fn build_walker(root_path: &Path) -> WalkBuilder {
    let mut builder = WalkBuilder::new(root_path);

    builder.standard_filters(true);
    builder.git_ignore(true);
    builder.git_global(true);
    builder.git_exclude(true);
    // Honour .gitignore even when the project is not a git checkout.
    builder.require_git(false);
    builder.follow_links(false);
    builder.add_custom_ignore_filename(REVIEW_IGNORE_FILENAME);

    // Override globs are whitelists unless prefixed with `!`.
    let mut override_builder = OverrideBuilder::new(root_path);
    for pattern in DEFAULT_SENSITIVE_RULES {
        if let Err(e) = override_builder.add(&format!("!{}", pattern)) {
            warn!("Failed to add sensitive file rule '{}': {}", pattern, e);
        }
    }
    for dir in DEFAULT_IGNORED_DIRS {
        if let Err(e) = override_builder.add(&format!("!**/{}/", dir)) {
            warn!("Failed to add ignored directory rule '{}': {}", dir, e);
        }
    }
    match override_builder.build() {
        Ok(overrides) => {
            builder.overrides(overrides);
        }
        Err(e) => warn!("Failed to build ignore overrides: {}", e),
    }

    builder
}

/// Walk the project and collect every uploadable file, sorted by path.
pub fn scan_project(root_path: &Path) -> Vec<SourceFile> {
    let mut files = Vec::new();

    debug!("Scanning project: {}", root_path.display());

    for entry in build_walker(root_path).build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Error walking directory: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        if let Some(file) = read_source_file(path, root_path) {
            files.push(file);
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    debug!("Found {} files in project", files.len());

    files
}

/// Returns None if the file should be skipped (too large, binary, unreadable).
fn read_source_file(path: &Path, root_path: &Path) -> Option<SourceFile> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            warn!("Failed to get metadata for {}: {}", path.display(), e);
            return None;
        }
    };

    if metadata.len() > MAX_READABLE_FILE_SIZE {
        debug!(
            "Skipping large file ({} bytes): {}",
            metadata.len(),
            path.display()
        );
        return None;
    }

    let content_bytes = match fs::read(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read file {}: {}", path.display(), e);
            return None;
        }
    };

    let content = match String::from_utf8(content_bytes) {
        Ok(s) => s,
        Err(_) => {
            debug!("Skipping binary file: {}", path.display());
            return None;
        }
    };

    let relative_path = match path.strip_prefix(root_path) {
        Ok(p) => p.to_string_lossy().replace('\\', "/"),
        Err(_) => {
            warn!("Failed to get relative path for {}", path.display());
            return None;
        }
    };

    Some(SourceFile {
        path: relative_path,
        content,
    })
}
