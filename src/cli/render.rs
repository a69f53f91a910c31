//! Terminal rendering of upload states and analysis results.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use console::style;

use crate::models::{AnalysisResult, Emotion, ImagePayload};
use crate::orchestrator::OrchestratorState;

/// Render the emotion cards of a result, primary first.
pub fn render_result(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let primary = &result.primary_emotion;
    out.push_str(&format!(
        "{}  {}  {}\n",
        primary.emoji,
        style(&primary.name).bold(),
        style(format!("{}%", primary.percentage.round())).bold().magenta()
    ));
    out.push_str(&wrap(&primary.description, 72, "    "));

    let others: Vec<&Emotion> = result.emotions().skip(1).collect();
    if !others.is_empty() {
        out.push_str(&format!("\n{}\n", style("Also detected").dim()));
    }
    for emotion in others {
        out.push_str(&format!(
            "\n{}  {}  {}\n",
            emotion.emoji,
            style(&emotion.name).bold(),
            style(format!("{}% match", emotion.percentage.round())).magenta()
        ));
        out.push_str(&wrap(&emotion.description, 72, "    "));
    }
    out
}

/// One-line summary of a state, for the interactive session.
pub fn render_state(state: &OrchestratorState) -> String {
    match state {
        OrchestratorState::Idle => format!("{} Drop your MP3 here", style("idle").dim()),
        OrchestratorState::Dragging => format!("{} Drop it!", style("dragging").cyan()),
        OrchestratorState::Submitting => {
            format!("{} Analyzing your vibe...", style("submitting").yellow())
        }
        OrchestratorState::Errored(msg) => format!("{} {}", style("error").red(), msg),
        OrchestratorState::Displaying(result) => format!(
            "{} {} {} ({}%)",
            style("result").green(),
            result.primary_emotion.emoji,
            result.primary_emotion.name,
            result.primary_emotion.percentage.round()
        ),
    }
}

fn wrap(text: &str, width: usize, indent: &str) -> String {
    let mut out = String::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.chars().count() + word.chars().count() + 1 > width {
            out.push_str(indent);
            out.push_str(&line);
            out.push('\n');
            line.clear();
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        out.push_str(indent);
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Turn the image payload into raw image bytes.
///
/// Text may be a `data:` URL or plain base64; text that isn't valid base64
/// is taken as-is.
pub fn image_bytes(image: &ImagePayload) -> Vec<u8> {
    match image {
        ImagePayload::Binary(bytes) => bytes.clone(),
        ImagePayload::Text(text) => {
            let text = text.trim();
            if let Some(rest) = text.strip_prefix("data:") {
                if let Some((header, data)) = rest.split_once(',') {
                    if header.ends_with(";base64") {
                        if let Ok(decoded) = STANDARD.decode(data) {
                            return decoded;
                        }
                    }
                    return data.as_bytes().to_vec();
                }
            }
            STANDARD
                .decode(text)
                .unwrap_or_else(|_| text.as_bytes().to_vec())
        }
    }
}

/// File extension for the image, detected from its magic bytes.
pub fn image_extension(bytes: &[u8]) -> &'static str {
    infer::get(bytes).map(|t| t.extension()).unwrap_or("bin")
}

/// Write the result image. With an explicit path the image goes exactly
/// there; otherwise it's named after the track inside `dir`.
pub async fn write_image(
    image: &ImagePayload,
    explicit: Option<&Path>,
    dir: &Path,
    track_name: &str,
) -> std::io::Result<PathBuf> {
    let bytes = image_bytes(image);
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let stem = Path::new(track_name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "track".to_string());
            dir.join(format!("{}-mood.{}", stem, image_extension(&bytes)))
        }
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, &bytes).await?;
    Ok(path)
}
