//! Diagnostic logging setup.
//!
//! The panel owns the terminal, so diagnostics must never hit stdout or
//! stderr while it runs. With `--log-file` traces go to that file, filtered
//! through `RUST_LOG`; without it logging stays off entirely.

use std::error::Error;
use std::fs::OpenOptions;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

pub fn init(log_file: Option<&str>) -> Result<(), Box<dyn Error>> {
    let Some(path) = log_file else {
        return Ok(());
    };

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}
