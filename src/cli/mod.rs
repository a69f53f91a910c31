//! Command-line presentation layer.

mod commands;
mod icons;
mod render;

pub use commands::{is_verbose, run};
