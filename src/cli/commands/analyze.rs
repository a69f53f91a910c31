//! One-shot analysis of a track from the command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use crate::cli::icons::{dim_arrow, success, warn};
use crate::cli::render::{render_result, write_image};
use crate::client::AnalysisClient;
use crate::config::Settings;
use crate::models::SelectedFile;
use crate::orchestrator::{OrchestratorState, UploadEvent, UploadOrchestrator};

/// Analyze the first of `files`, as if it had been picked in a file dialog.
pub async fn cmd_analyze(
    settings: &Settings,
    files: &[PathBuf],
    json: bool,
    image_out: Option<&Path>,
    save_image: bool,
) -> anyhow::Result<()> {
    let Some(first) = files.first() else {
        anyhow::bail!("No file given");
    };
    if files.len() > 1 {
        debug!("Ignoring {} extra file(s)", files.len() - 1);
    }

    let file = SelectedFile::from_path(first)
        .await
        .with_context(|| format!("Failed to read {}", first.display()))?;
    let track_name = file.name().to_string();

    let client = Arc::new(AnalysisClient::new(settings.client_config())?);
    let mut orchestrator = UploadOrchestrator::new(client);

    // No picker to re-arm here; the returned commands don't apply.
    orchestrator.handle(UploadEvent::FilesPicked(vec![file]));

    if orchestrator.state().is_submitting() {
        let pb = spinner(format!("Analyzing {}...", track_name));
        tokio::select! {
            _ = orchestrator.next_completion() => {}
            _ = tokio::signal::ctrl_c() => {
                orchestrator.reset();
            }
        }
        pb.finish_and_clear();
    }

    match orchestrator.state() {
        OrchestratorState::Displaying(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(result)?);
            } else {
                println!("{} {}\n", success(), style(&track_name).bold());
                print!("{}", render_result(result));
            }

            if image_out.is_some() || save_image {
                let path = write_image(&result.image, image_out, &settings.image_dir, &track_name)
                    .await
                    .context("Failed to write mood image")?;
                eprintln!("{} Image saved to {}", dim_arrow(), path.display());
            }
            Ok(())
        }
        OrchestratorState::Errored(message) => anyhow::bail!("{}", message),
        OrchestratorState::Idle => {
            eprintln!("{} Cancelled", warn());
            Ok(())
        }
        other => anyhow::bail!("Analysis ended in unexpected state: {}", other.as_str()),
    }
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.magenta} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
