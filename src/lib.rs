//! moodtrack - find out what your music feels like.
//!
//! Submits a single audio track to a remote emotion analysis service and
//! tracks the upload through a small state machine that a presentation layer
//! (the bundled CLI, or anything else) can render.

pub mod cli;
pub mod client;
pub mod config;
pub mod models;
pub mod orchestrator;

pub use client::{AnalysisClient, AnalysisError, AnalysisOutcome, Analyzer, ClientConfig};
pub use models::{AnalysisResult, Emotion, ImagePayload, SelectedFile};
pub use orchestrator::{
    OrchestratorState, PresentationCommand, UploadEvent, UploadOrchestrator, UploadView,
};
