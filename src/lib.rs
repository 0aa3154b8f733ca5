//! Codepane is the terminal presentation layer for an AI coding assistant.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the session state record, the streaming engine that paces
//!   model output onto the screen, the mode/indexing state machine, and the
//!   dispatcher that routes backend events into panel actions.
//! - [`ui`] renders the panel and runs the interactive event loop that drives
//!   user input, frame pacing, and display updates.
//! - [`utils`] holds small shared helpers (transcript dumps, test fixtures).
//!
//! The runtime entrypoint lives in the binary crate (`src/main.rs`), which
//! spawns the backend process and hands its event stream to
//! [`ui::panel_loop`].

pub mod core;
pub mod ui;
pub mod utils;
