use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

mod api;
mod cli;
mod command;
mod config;
mod error;
mod poller;
mod provision;
mod review;
mod state;
mod workspace;

use cli::{Cli, Commands};
use review::ReviewContext;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let Some(subcommand) = args.command else {
        eprintln!("No command specified. Use --help for usage information.");
        eprintln!("Use 'review-assistant preview' to see what would be uploaded.");
        return Ok(());
    };

    let project_root = cli::resolve_workspace_root(args.workspace_root)?;
    let project_name = cli::resolve_project_name(args.project, &project_root)?;
    let state_dir = cli::resolve_state_dir(args.state_dir)?;
    let settings = args.engine.into_settings(project_root, project_name, state_dir);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⛔ Interrupted; finishing in-flight requests");
            on_interrupt.cancel();
        }
    });

    match subcommand {
        Commands::Review {
            change,
            prompt,
            prompt_file,
            fresh,
            force_new_assistant,
        } => {
            let prompt = command::read_prompt(prompt, prompt_file)?;
            let context = ReviewContext {
                change_id: change,
                force_fresh_thread: fresh,
                force_new_assistant,
            };
            command::run_review(settings, context, prompt, cancel).await?;
        }
        Commands::Batch { requests } => {
            command::run_batch(settings, &requests, cancel).await?;
        }
        Commands::Merged { change } => {
            command::run_merged(settings, &change)?;
        }
        Commands::Status { change } => {
            command::run_status(settings, change.as_deref())?;
        }
        Commands::Preview { all } => {
            command::run_preview(settings, all).await?;
        }
    }

    Ok(())
}
