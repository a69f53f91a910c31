//! Upload state machine.
//!
//! Turns drag, drop, click and picker events into at most one analysis
//! request at a time and tracks what the user should be seeing. Transition
//! logic is synchronous; only the analysis call runs in the background, and
//! its completion is applied later through [`UploadOrchestrator::next_completion`]
//! or the [`UploadOrchestrator::run`] loop.
//!
//! Every submission gets a new generation token. A completion is applied only
//! if its token is still the current one, so a reset (or anything else that
//! moves on) makes late answers harmless.

mod event;
mod state;
mod validate;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{AnalysisError, AnalysisOutcome, Analyzer};
use crate::models::SelectedFile;

pub use event::{PresentationCommand, UploadEvent};
pub use state::{OrchestratorState, UploadView};
pub use validate::{validate, ValidationError, INVALID_FILE_MESSAGE};

/// Resolution of a background analysis call, tagged with its submission token.
#[derive(Debug)]
pub struct Completion {
    token: u64,
    outcome: AnalysisOutcome,
}

/// Drives one upload surface.
///
/// Submissions are spawned on the current tokio runtime, so event handling
/// must happen inside one.
pub struct UploadOrchestrator<A: Analyzer + ?Sized + 'static> {
    analyzer: Arc<A>,
    state: OrchestratorState,
    generation: u64,
    /// Error that was showing when a drag started; restored if the drag ends
    /// without a file.
    held_error: Option<String>,
    in_flight: Option<JoinHandle<()>>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl<A: Analyzer + ?Sized + 'static> UploadOrchestrator<A> {
    /// Create an orchestrator in the `Idle` state.
    pub fn new(analyzer: Arc<A>) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            analyzer,
            state: OrchestratorState::Idle,
            generation: 0,
            held_error: None,
            in_flight: None,
            completions_tx,
            completions_rx,
        }
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    /// Flattened view. An error stays visible while a file is dragged over.
    pub fn view(&self) -> UploadView<'_> {
        let mut view = self.state.view();
        if view.error.is_none() {
            view.error = self.held_error.as_deref();
        }
        view
    }

    /// Whether a submission is awaiting its completion.
    pub fn has_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Apply a user event. Returns the commands the presentation layer
    /// should carry out.
    pub fn handle(&mut self, event: UploadEvent) -> Vec<PresentationCommand> {
        debug!("Event {} in state {}", event.as_str(), self.state.as_str());
        match event {
            UploadEvent::DragEnter => {
                let held = self.state.error().map(str::to_string);
                if held.is_some() || self.state == OrchestratorState::Idle {
                    self.transition(OrchestratorState::Dragging);
                    self.held_error = held;
                }
                Vec::new()
            }
            UploadEvent::DragLeave => {
                if self.state == OrchestratorState::Dragging {
                    self.end_drag();
                }
                Vec::new()
            }
            UploadEvent::Drop(files) => {
                self.accept(files);
                Vec::new()
            }
            UploadEvent::Click => {
                if self.state.accepts_files() {
                    vec![PresentationCommand::OpenPicker]
                } else {
                    Vec::new()
                }
            }
            UploadEvent::FilesPicked(files) => {
                self.accept(files);
                // Always re-arm, whether or not the file was usable.
                vec![PresentationCommand::ClearPicker]
            }
            UploadEvent::Reset => {
                self.reset();
                Vec::new()
            }
        }
    }

    /// Go back to `Idle`, dropping any result or error.
    ///
    /// A request still in flight is abandoned: its task is aborted and its
    /// token invalidated.
    pub fn reset(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            debug!("Abandoning in-flight submission {}", self.generation);
            handle.abort();
        }
        self.generation += 1;
        self.transition(OrchestratorState::Idle);
    }

    /// Apply a completion if it belongs to the current submission.
    ///
    /// Returns whether the state changed.
    pub fn apply_completion(&mut self, completion: Completion) -> bool {
        if completion.token != self.generation || !self.state.is_submitting() {
            warn!(
                "Discarding stale analysis completion (token {}, current {})",
                completion.token, self.generation
            );
            return false;
        }

        self.in_flight = None;
        let next = match completion.outcome {
            AnalysisOutcome::Success(result) => OrchestratorState::Displaying(result),
            AnalysisOutcome::Failure(e) => OrchestratorState::Errored(e.user_message().to_string()),
        };
        self.transition(next);
        true
    }

    /// Wait for the pending submission to resolve and apply it.
    ///
    /// Returns `false` immediately when nothing is pending. Stale completions
    /// received along the way are discarded.
    pub async fn next_completion(&mut self) -> bool {
        while self.in_flight.is_some() {
            match self.completions_rx.recv().await {
                Some(completion) => {
                    if self.apply_completion(completion) {
                        return true;
                    }
                }
                None => break,
            }
        }
        false
    }

    /// Event loop: handle events until the sender is dropped, applying
    /// completions as they arrive.
    ///
    /// Every state change is published on `states`; commands for the input
    /// controls go to `commands`. Returns the final state.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<UploadEvent>,
        states: watch::Sender<OrchestratorState>,
        commands: mpsc::UnboundedSender<PresentationCommand>,
    ) -> OrchestratorState {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        for command in self.handle(event) {
                            if commands.send(command).is_err() {
                                debug!("Command receiver dropped");
                            }
                        }
                    }
                    None => break,
                },
                Some(completion) = self.completions_rx.recv() => {
                    self.apply_completion(completion);
                }
            }

            let current = &self.state;
            states.send_if_modified(|published| {
                if published != current {
                    *published = current.clone();
                    true
                } else {
                    false
                }
            });
        }

        std::mem::take(&mut self.state)
    }

    /// Single entry point for dropped and picked files.
    fn accept(&mut self, files: Vec<SelectedFile>) {
        if !self.state.accepts_files() {
            debug!(
                "Ignoring {} file(s) while {}",
                files.len(),
                self.state.as_str()
            );
            return;
        }

        let total = files.len();
        let Some(file) = files.into_iter().next() else {
            if self.state == OrchestratorState::Dragging {
                self.end_drag();
            }
            return;
        };
        if total > 1 {
            debug!("Processing {} and discarding {} other file(s)", file.name(), total - 1);
        }

        match validate(&file) {
            Ok(()) => self.submit(file),
            Err(e) => {
                info!("Rejected {} ({:?})", e.file_name, e.mime_type);
                self.transition(OrchestratorState::Errored(e.to_string()));
            }
        }
    }

    fn submit(&mut self, file: SelectedFile) {
        self.generation += 1;
        let token = self.generation;
        self.transition(OrchestratorState::Submitting);

        let analyzer = Arc::clone(&self.analyzer);
        let tx = self.completions_tx.clone();
        self.in_flight = Some(tokio::spawn(async move {
            let outcome = AssertUnwindSafe(analyzer.submit(file))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    warn!("Analyzer panicked during submission {}", token);
                    AnalysisOutcome::Failure(AnalysisError::Transport(
                        "analyzer panicked".to_string(),
                    ))
                });
            // The orchestrator may be gone; nothing to report to then.
            let _ = tx.send(Completion { token, outcome });
        }));
    }

    /// Leave `Dragging` without a file: back to the error, if one was showing.
    fn end_drag(&mut self) {
        let next = match self.held_error.take() {
            Some(message) => OrchestratorState::Errored(message),
            None => OrchestratorState::Idle,
        };
        self.transition(next);
    }

    fn transition(&mut self, next: OrchestratorState) {
        if next != OrchestratorState::Dragging {
            self.held_error = None;
        }
        if self.state.as_str() != next.as_str() {
            debug!("State {} -> {}", self.state.as_str(), next.as_str());
        }
        self.state = next;
    }
}

impl<A: Analyzer + ?Sized + 'static> Drop for UploadOrchestrator<A> {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AnalysisError;
    use crate::models::{AnalysisResult, Emotion, ImagePayload};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Analyzer double returning a fixed outcome, optionally held until released.
    struct ScriptedAnalyzer {
        outcome: AnalysisOutcome,
        gate: Option<Arc<Notify>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedAnalyzer {
        fn new(outcome: AnalysisOutcome) -> Self {
            Self {
                outcome,
                gate: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn gated(outcome: AnalysisOutcome, gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new(outcome)
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Analyzer for ScriptedAnalyzer {
        async fn submit(&self, file: SelectedFile) -> AnalysisOutcome {
            self.calls.lock().unwrap().push(file.name().to_string());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.outcome.clone()
        }
    }

    fn result() -> AnalysisResult {
        AnalysisResult {
            image: ImagePayload::Text("aW1n".to_string()),
            primary_emotion: Emotion {
                name: "Happy".to_string(),
                percentage: 82.0,
                emoji: "😊".to_string(),
                description: "bright".to_string(),
            },
            secondary_emotion: None,
            tertiary_emotion: None,
        }
    }

    fn success() -> AnalysisOutcome {
        AnalysisOutcome::Success(result())
    }

    fn mp3(name: &str) -> SelectedFile {
        SelectedFile::new(name, Some("audio/mpeg".to_string()), b"ID3".to_vec())
    }

    fn txt(name: &str) -> SelectedFile {
        SelectedFile::new(name, Some("text/plain".to_string()), b"hello".to_vec())
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_drag_enter_and_leave() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(success()));
        let mut orch = UploadOrchestrator::new(analyzer);

        orch.handle(UploadEvent::DragEnter);
        assert_eq!(*orch.state(), OrchestratorState::Dragging);
        assert!(orch.view().is_dragging);

        orch.handle(UploadEvent::DragLeave);
        assert_eq!(*orch.state(), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn test_invalid_file_never_reaches_analyzer() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(success()));
        let mut orch = UploadOrchestrator::new(Arc::clone(&analyzer));

        let commands = orch.handle(UploadEvent::FilesPicked(vec![txt("notes.txt")]));
        assert_eq!(commands, vec![PresentationCommand::ClearPicker]);
        assert_eq!(
            *orch.state(),
            OrchestratorState::Errored(INVALID_FILE_MESSAGE.to_string())
        );
        assert!(!orch.has_pending());

        settle().await;
        assert!(analyzer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_submitting_before_response_then_displaying() {
        let gate = Arc::new(Notify::new());
        let analyzer = Arc::new(ScriptedAnalyzer::gated(success(), Arc::clone(&gate)));
        let mut orch = UploadOrchestrator::new(Arc::clone(&analyzer));

        orch.handle(UploadEvent::DragEnter);
        orch.handle(UploadEvent::Drop(vec![mp3("song.mp3")]));
        assert_eq!(*orch.state(), OrchestratorState::Submitting);
        assert!(orch.view().is_loading);

        settle().await;
        assert_eq!(analyzer.calls(), vec!["song.mp3"]);
        assert!(orch.state().is_submitting());

        gate.notify_one();
        assert!(orch.next_completion().await);
        let shown = orch.state().result().expect("result should be displayed");
        assert_eq!(shown.emotions().count(), 1);
        assert!(orch.view().error.is_none());
    }

    #[tokio::test]
    async fn test_failure_shows_message() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(AnalysisOutcome::Failure(
            AnalysisError::Service {
                status: 500,
                message: "model unavailable".to_string(),
            },
        )));
        let mut orch = UploadOrchestrator::new(analyzer);

        orch.handle(UploadEvent::Drop(vec![mp3("track.mp3")]));
        assert!(orch.next_completion().await);
        assert_eq!(orch.view().error, Some("model unavailable"));
        assert!(orch.view().result.is_none());
    }

    #[tokio::test]
    async fn test_single_flight() {
        let gate = Arc::new(Notify::new());
        let analyzer = Arc::new(ScriptedAnalyzer::gated(success(), Arc::clone(&gate)));
        let mut orch = UploadOrchestrator::new(Arc::clone(&analyzer));

        orch.handle(UploadEvent::Drop(vec![mp3("first.mp3")]));
        orch.handle(UploadEvent::Drop(vec![mp3("second.mp3")]));
        let commands = orch.handle(UploadEvent::FilesPicked(vec![mp3("third.mp3")]));
        assert_eq!(commands, vec![PresentationCommand::ClearPicker]);
        assert!(orch.handle(UploadEvent::Click).is_empty());

        settle().await;
        assert_eq!(analyzer.calls(), vec!["first.mp3"]);

        gate.notify_one();
        assert!(orch.next_completion().await);
        assert!(orch.state().result().is_some());
    }

    #[tokio::test]
    async fn test_only_first_file_is_processed() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(success()));
        let mut orch = UploadOrchestrator::new(Arc::clone(&analyzer));

        orch.handle(UploadEvent::Drop(vec![txt("notes.txt"), mp3("song.mp3")]));
        assert_eq!(orch.view().error, Some(INVALID_FILE_MESSAGE));

        orch.handle(UploadEvent::Drop(vec![mp3("song.mp3"), txt("notes.txt")]));
        assert!(orch.next_completion().await);
        assert_eq!(analyzer.calls(), vec!["song.mp3"]);
    }

    #[tokio::test]
    async fn test_empty_drop_ends_drag() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(success()));
        let mut orch = UploadOrchestrator::new(analyzer);

        orch.handle(UploadEvent::DragEnter);
        orch.handle(UploadEvent::Drop(Vec::new()));
        assert_eq!(*orch.state(), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn test_error_survives_drag_without_file() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(success()));
        let mut orch = UploadOrchestrator::new(analyzer);

        orch.handle(UploadEvent::Drop(vec![txt("notes.txt")]));
        orch.handle(UploadEvent::DragEnter);
        assert_eq!(*orch.state(), OrchestratorState::Dragging);
        assert!(orch.view().is_dragging);
        assert_eq!(orch.view().error, Some(INVALID_FILE_MESSAGE));

        orch.handle(UploadEvent::DragLeave);
        assert_eq!(
            *orch.state(),
            OrchestratorState::Errored(INVALID_FILE_MESSAGE.to_string())
        );

        orch.handle(UploadEvent::DragEnter);
        orch.handle(UploadEvent::Drop(Vec::new()));
        assert_eq!(orch.view().error, Some(INVALID_FILE_MESSAGE));
    }

    #[tokio::test]
    async fn test_error_cleared_once_dragged_file_is_accepted() {
        let gate = Arc::new(Notify::new());
        let analyzer = Arc::new(ScriptedAnalyzer::gated(success(), gate));
        let mut orch = UploadOrchestrator::new(analyzer);

        orch.handle(UploadEvent::Drop(vec![txt("notes.txt")]));
        orch.handle(UploadEvent::DragEnter);
        orch.handle(UploadEvent::Drop(vec![mp3("song.mp3")]));
        assert!(orch.state().is_submitting());
        assert!(orch.view().error.is_none());

        orch.handle(UploadEvent::Reset);
        assert_eq!(orch.view().error, None);
    }

    struct PanickingAnalyzer;

    #[async_trait]
    impl Analyzer for PanickingAnalyzer {
        async fn submit(&self, _file: SelectedFile) -> AnalysisOutcome {
            panic!("decoder blew up");
        }
    }

    #[tokio::test]
    async fn test_panicking_analyzer_ends_in_error() {
        let mut orch = UploadOrchestrator::new(Arc::new(PanickingAnalyzer));

        orch.handle(UploadEvent::Drop(vec![mp3("track.mp3")]));
        let applied =
            tokio::time::timeout(std::time::Duration::from_secs(2), orch.next_completion())
                .await
                .expect("completion should not hang");
        assert!(applied);
        assert_eq!(
            *orch.state(),
            OrchestratorState::Errored(crate::client::GENERIC_FAILURE.to_string())
        );
        assert!(!orch.has_pending());
    }

    #[tokio::test]
    async fn test_click_opens_picker() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(success()));
        let mut orch = UploadOrchestrator::new(analyzer);

        assert_eq!(
            orch.handle(UploadEvent::Click),
            vec![PresentationCommand::OpenPicker]
        );
    }

    #[tokio::test]
    async fn test_reset_clears_result_and_error() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(success()));
        let mut orch = UploadOrchestrator::new(analyzer);

        orch.handle(UploadEvent::Drop(vec![mp3("song.mp3")]));
        assert!(orch.next_completion().await);
        assert!(orch.state().result().is_some());

        orch.handle(UploadEvent::Reset);
        assert_eq!(*orch.state(), OrchestratorState::Idle);
        orch.handle(UploadEvent::Reset);
        assert_eq!(*orch.state(), OrchestratorState::Idle);

        orch.handle(UploadEvent::Drop(vec![txt("notes.txt")]));
        orch.handle(UploadEvent::Reset);
        let view = orch.view();
        assert!(view.error.is_none() && view.result.is_none());
    }

    #[tokio::test]
    async fn test_displaying_ignores_new_files_until_reset() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(success()));
        let mut orch = UploadOrchestrator::new(Arc::clone(&analyzer));

        orch.handle(UploadEvent::Drop(vec![mp3("one.mp3")]));
        assert!(orch.next_completion().await);

        orch.handle(UploadEvent::Drop(vec![mp3("two.mp3")]));
        assert!(orch.state().result().is_some());
        assert!(!orch.has_pending());

        settle().await;
        assert_eq!(analyzer.calls(), vec!["one.mp3"]);
    }

    #[tokio::test]
    async fn test_retry_after_error_submits_again() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(AnalysisOutcome::Failure(
            AnalysisError::Transport("connection refused".to_string()),
        )));
        let mut orch = UploadOrchestrator::new(Arc::clone(&analyzer));

        orch.handle(UploadEvent::Drop(vec![mp3("track.mp3")]));
        assert!(orch.next_completion().await);
        assert!(orch.view().error.is_some());

        orch.handle(UploadEvent::DragEnter);
        orch.handle(UploadEvent::Drop(vec![mp3("track.mp3")]));
        assert!(orch.state().is_submitting());
        assert!(orch.next_completion().await);
        assert_eq!(analyzer.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_reset_while_submitting_ignores_late_response() {
        let gate = Arc::new(Notify::new());
        let analyzer = Arc::new(ScriptedAnalyzer::gated(success(), Arc::clone(&gate)));
        let mut orch = UploadOrchestrator::new(Arc::clone(&analyzer));

        orch.handle(UploadEvent::Drop(vec![mp3("track.mp3")]));
        settle().await;
        orch.handle(UploadEvent::Reset);
        assert_eq!(*orch.state(), OrchestratorState::Idle);

        gate.notify_one();
        settle().await;
        assert!(!orch.next_completion().await);
        assert_eq!(*orch.state(), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn test_stale_completion_in_channel_is_discarded() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(success()));
        let mut orch = UploadOrchestrator::new(Arc::clone(&analyzer));

        // First submission finishes and queues its completion, then gets reset.
        orch.handle(UploadEvent::Drop(vec![mp3("first.mp3")]));
        settle().await;
        orch.handle(UploadEvent::Reset);

        orch.handle(UploadEvent::Drop(vec![txt("notes.txt")]));
        orch.handle(UploadEvent::Drop(vec![mp3("second.mp3")]));
        assert!(orch.next_completion().await);
        assert!(orch.state().result().is_some());
        assert_eq!(analyzer.calls(), vec!["first.mp3", "second.mp3"]);
    }

    #[tokio::test]
    async fn test_apply_completion_checks_token() {
        let gate = Arc::new(Notify::new());
        let analyzer = Arc::new(ScriptedAnalyzer::gated(success(), gate));
        let mut orch = UploadOrchestrator::new(analyzer);

        orch.handle(UploadEvent::Drop(vec![mp3("track.mp3")]));
        let stale = Completion {
            token: orch.generation - 1,
            outcome: success(),
        };
        assert!(!orch.apply_completion(stale));
        assert!(orch.state().is_submitting());

        let current = Completion {
            token: orch.generation,
            outcome: success(),
        };
        assert!(orch.apply_completion(current));
        assert!(orch.state().result().is_some());
    }

    #[tokio::test]
    async fn test_run_loop_publishes_states_and_commands() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(success()));
        let orch = UploadOrchestrator::new(analyzer);

        let (events_tx, events_rx) = mpsc::channel(8);
        let (states_tx, mut states_rx) = watch::channel(OrchestratorState::Idle);
        let (commands_tx, mut commands_rx) = mpsc::unbounded_channel();
        let runner = tokio::spawn(orch.run(events_rx, states_tx, commands_tx));

        events_tx.send(UploadEvent::Click).await.unwrap();
        assert_eq!(
            commands_rx.recv().await,
            Some(PresentationCommand::OpenPicker)
        );

        events_tx
            .send(UploadEvent::FilesPicked(vec![mp3("song.mp3")]))
            .await
            .unwrap();
        assert_eq!(
            commands_rx.recv().await,
            Some(PresentationCommand::ClearPicker)
        );

        let displayed = states_rx
            .wait_for(|s| s.result().is_some())
            .await
            .map(|s| (*s).clone())
            .unwrap();
        assert_eq!(displayed.result().unwrap().primary_emotion.name, "Happy");

        events_tx.send(UploadEvent::Reset).await.unwrap();
        states_rx
            .wait_for(|s| *s == OrchestratorState::Idle)
            .await
            .unwrap();

        drop(events_tx);
        let final_state = runner.await.unwrap();
        assert_eq!(final_state, OrchestratorState::Idle);
    }
}
