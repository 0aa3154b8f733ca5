use clap::Parser;

use codepane::core::app;
use codepane::core::backend::BackendService;
use codepane::core::config::Config;
use codepane::ui::panel_loop;
use codepane::utils::logging;

#[derive(Parser)]
#[command(name = "codepane")]
#[command(about = "A terminal panel for an AI coding assistant")]
#[command(long_about = "Codepane renders a conversation with an AI coding assistant, \
streams responses at a readable pace, and coordinates agent, plan/act, and \
retrieval modes driven by a backend process.\n\n\
The backend is spawned as a child process; it emits one JSON event per line \
on stdout and accepts one JSON request per line on stdin.\n\n\
Controls:\n\
  Enter             Send the message\n\
  Esc               Cancel the in-flight response\n\
  Ctrl+A            Toggle agent mode\n\
  Ctrl+T            Toggle plan/act (when visible)\n\
  Ctrl+R            Toggle retrieval\n\
  Ctrl+D            Save the transcript to a file\n\
  PageUp/PageDown   Scroll the transcript\n\
  Ctrl+C            Cancel, then quit")]
struct Args {
    /// Backend command line to spawn (run through the shell)
    #[arg(long, value_name = "CMD")]
    backend: String,

    /// Write diagnostics to this file (level via RUST_LOG)
    #[arg(long, value_name = "FILE")]
    log_file: Option<String>,

    /// Disable markdown rendering of assistant responses
    #[arg(long)]
    plain: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init(args.log_file.as_deref())?;

    let mut config = Config::load();
    if args.plain {
        config.markdown = Some(false);
    }
    let app = app::new_from_config(config);

    let (service, events) = BackendService::spawn_shell(&args.backend)?;
    panel_loop::run(app, service, events).await
}
