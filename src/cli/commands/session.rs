//! Interactive drop zone driven from stdin.
//!
//! Each line is one user interaction. The orchestrator runs in its own task;
//! state changes and picker commands are printed as they happen, so a reset
//! typed while a request is in flight behaves exactly like the button would.

use std::path::PathBuf;
use std::sync::Arc;

use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::cli::icons::{dim_arrow, error, info, success};
use crate::cli::render::{render_result, render_state, write_image};
use crate::client::AnalysisClient;
use crate::config::Settings;
use crate::models::SelectedFile;
use crate::orchestrator::{OrchestratorState, PresentationCommand, UploadEvent, UploadOrchestrator};

const HELP: &str = "\
  enter            drag a file over the drop zone
  leave            drag it away again
  drop <paths>     drop file(s); only the first is used
  click            click the drop zone (opens the picker)
  pick <paths>     choose file(s) in the picker; only the first is used
  reset            analyze another song
  state            show the current state
  save             write the current mood image to the image directory
  quit             leave the session";

/// A parsed input line.
#[derive(Debug)]
enum Input {
    Event(UploadEvent),
    Files { drop: bool, paths: Vec<PathBuf> },
    State,
    Save,
    Help,
    Quit,
}

fn parse_line(line: &str) -> Result<Input, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let paths = || -> Vec<PathBuf> {
        rest.split_whitespace()
            .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
            .collect()
    };

    match word {
        "enter" => Ok(Input::Event(UploadEvent::DragEnter)),
        "leave" => Ok(Input::Event(UploadEvent::DragLeave)),
        "click" => Ok(Input::Event(UploadEvent::Click)),
        "reset" | "back" => Ok(Input::Event(UploadEvent::Reset)),
        "drop" => Ok(Input::Files {
            drop: true,
            paths: paths(),
        }),
        "pick" => Ok(Input::Files {
            drop: false,
            paths: paths(),
        }),
        "state" => Ok(Input::State),
        "save" => Ok(Input::Save),
        "help" | "?" => Ok(Input::Help),
        "quit" | "exit" => Ok(Input::Quit),
        other => Err(format!("Unknown command '{}' (try 'help')", other)),
    }
}

async fn load_files(paths: &[PathBuf]) -> anyhow::Result<Vec<SelectedFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = SelectedFile::from_path(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        files.push(file);
    }
    Ok(files)
}

fn print_state(state: &OrchestratorState) {
    println!("{} {}", dim_arrow(), render_state(state));
    if let OrchestratorState::Displaying(result) = state {
        println!();
        print!("{}", render_result(result));
        println!("\n{} type 'reset' to analyze another song", dim_arrow());
    }
}

pub async fn cmd_session(settings: &Settings) -> anyhow::Result<()> {
    let client = Arc::new(AnalysisClient::new(settings.client_config())?);
    let orchestrator = UploadOrchestrator::new(client);

    let (events_tx, events_rx) = mpsc::channel(16);
    let (states_tx, states_rx) = watch::channel(OrchestratorState::Idle);
    let (commands_tx, mut commands_rx) = mpsc::unbounded_channel();
    let runner = tokio::spawn(orchestrator.run(events_rx, states_tx, commands_tx));

    let current = states_rx.clone();
    let mut updates = states_rx;
    let printer = tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = updates.borrow_and_update().clone();
                    print_state(&state);
                }
                Some(command) = commands_rx.recv() => match command {
                    PresentationCommand::OpenPicker => {
                        println!("{} Picker open: choose with 'pick <paths>'", info());
                    }
                    PresentationCommand::ClearPicker => debug!("Picker cleared"),
                },
            }
        }
    });

    println!(
        "{} {} (endpoint {})",
        info(),
        style("moodtrack session").bold(),
        settings.endpoint
    );
    println!("{}", HELP);
    print_state(&current.borrow());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let event = match parse_line(&line) {
            Ok(Input::Event(event)) => event,
            Ok(Input::Files { drop, paths }) => match load_files(&paths).await {
                Ok(files) if drop => UploadEvent::Drop(files),
                Ok(files) => UploadEvent::FilesPicked(files),
                Err(e) => {
                    eprintln!("{} {}", error(), e);
                    continue;
                }
            },
            Ok(Input::State) => {
                print_state(&current.borrow());
                continue;
            }
            Ok(Input::Save) => {
                let image = current.borrow().result().map(|r| r.image.clone());
                match image {
                    Some(image) => {
                        match write_image(&image, None, &settings.image_dir, "session").await {
                            Ok(path) => println!("{} Image saved to {}", success(), path.display()),
                            Err(e) => eprintln!("{} Failed to save image: {}", error(), e),
                        }
                    }
                    None => eprintln!("{} No result to save", error()),
                }
                continue;
            }
            Ok(Input::Help) => {
                println!("{}", HELP);
                continue;
            }
            Ok(Input::Quit) => break,
            Err(message) => {
                eprintln!("{} {}", error(), message);
                continue;
            }
        };

        if events_tx.send(event).await.is_err() {
            break;
        }
    }

    drop(events_tx);
    runner.await?;
    printer.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_events() {
        assert!(matches!(
            parse_line("enter"),
            Ok(Input::Event(UploadEvent::DragEnter))
        ));
        assert!(matches!(
            parse_line("  back "),
            Ok(Input::Event(UploadEvent::Reset))
        ));
        assert!(matches!(parse_line("quit"), Ok(Input::Quit)));
        assert!(parse_line("dance").is_err());
    }

    #[test]
    fn test_parse_files() {
        match parse_line("drop a.mp3  b.mp3") {
            Ok(Input::Files { drop, paths }) => {
                assert!(drop);
                assert_eq!(paths, vec![PathBuf::from("a.mp3"), PathBuf::from("b.mp3")]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            parse_line("pick"),
            Ok(Input::Files { drop: false, ref paths }) if paths.is_empty()
        ));
    }

    #[tokio::test]
    async fn test_load_files_reports_missing() {
        let err = load_files(&[PathBuf::from("/nonexistent/song.mp3")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/song.mp3"));
    }
}
