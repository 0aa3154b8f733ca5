//! Transcript dumps.
//!
//! Writes the visible conversation to a markdown file, through a temp file in
//! the target directory so an interrupted dump never leaves a partial file.

use std::collections::VecDeque;
use std::error::Error;
use std::io::Write;
use std::path::Path;

use chrono::Local;
use tempfile::NamedTempFile;

use crate::core::message::{Message, TranscriptRole};

pub fn default_dump_filename() -> String {
    format!("codepane-{}.md", Local::now().format("%Y%m%d-%H%M%S"))
}

pub fn write_transcript(path: &Path, messages: &VecDeque<Message>) -> Result<(), Box<dyn Error>> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp_file = NamedTempFile::new_in(parent)?;

    writeln!(
        temp_file,
        "# codepane session — {}",
        Local::now().format("%Y-%m-%d %H:%M")
    )?;
    writeln!(temp_file)?;

    for msg in messages {
        match msg.role {
            TranscriptRole::User => {
                for line in format!("You: {}", msg.content).lines() {
                    writeln!(temp_file, "{line}")?;
                }
                writeln!(temp_file)?;
            }
            TranscriptRole::Assistant if !msg.content.is_empty() => {
                for line in msg.content.lines() {
                    writeln!(temp_file, "{line}")?;
                }
                writeln!(temp_file)?;
            }
            // App notices and empty placeholders stay on screen only.
            _ => {}
        }
    }

    temp_file.flush()?;
    temp_file.persist(path)?;
    Ok(())
}
