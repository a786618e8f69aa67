use anyhow::Result;

use crate::config::Settings;
use crate::workspace::{chunk_filename, collect_project_files, pack_into_chunks};

fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} bytes", bytes)
    }
}

pub async fn run_preview(settings: Settings, show_all: bool) -> Result<()> {
    let root_path = settings.project_root.clone();
    if !root_path.exists() {
        anyhow::bail!("Workspace path does not exist: {}", root_path.display());
    }

    println!("Scanning workspace: {}\n", root_path.display());

    let files = collect_project_files(root_path).await?;
    let chunks = pack_into_chunks(&files, settings.upload_chunk_bytes);

    let total_files = files.len();
    let total_bytes: usize = files.iter().map(|f| f.content.len()).sum();

    println!("Summary:");
    println!("  Files to upload: {}", total_files);
    println!("  Total size: {}", format_size(total_bytes));
    println!(
        "  Upload documents: {} (up to {} each)",
        chunks.len(),
        format_size(settings.upload_chunk_bytes)
    );

    // Check for potentially sensitive patterns that slipped through
    let sensitive_patterns = ["password", "secret", "credential", "api_key", "apikey"];
    let sensitive_files: Vec<&str> = files
        .iter()
        .map(|f| f.path.as_str())
        .filter(|path| {
            let lower = path.to_lowercase();
            sensitive_patterns.iter().any(|pattern| lower.contains(pattern))
        })
        .collect();

    if !sensitive_files.is_empty() {
        println!(
            "\n⚠️  Warning: {} file(s) may contain sensitive data:",
            sensitive_files.len()
        );
        for path in &sensitive_files {
            println!("    - {}", path);
        }
        println!("\n  Consider adding these to .gitignore or .reviewignore");
    }

    if show_all {
        for (index, chunk) in chunks.iter().enumerate() {
            println!("\n{}:", chunk_filename(&settings.project_name, index));
            for file in chunk {
                println!("  {:>10}  {}", format_size(file.content.len()), file.path);
            }
        }
    } else if total_files > 0 {
        println!("\n  Use --all to see every file");
    }

    Ok(())
}
