//! The interactive panel loop.
//!
//! One cooperative loop multiplexes backend events, key input, queued
//! actions from deferred tasks, and the animation frame tick. All state
//! mutation happens inline here; the only other tasks are the backend
//! transport and the input reader, both of which communicate over channels.

use std::error::Error;
use std::io;
use std::time::{Duration, Instant};

use ratatui::backend::CrosstermBackend;
use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::Terminal;
use tokio::sync::mpsc;
use tracing::warn;

use crate::core::app::{
    apply_action, AppAction, AppActionDispatcher, AppCommand, App,
};
use crate::core::backend::{BackendEvent, BackendService};
use crate::core::dispatch::actions_for_event;
use crate::core::message::AppMessageKind;
use crate::core::message::Message;
use crate::ui::renderer::draw;
use crate::utils::transcript;

/// Frame cadence while a stream is animating; idle redraw cadence otherwise
/// (the pulse indicator still wants occasional frames).
const ACTIVE_FRAME: Duration = Duration::from_millis(16);
const IDLE_FRAME: Duration = Duration::from_millis(250);

pub async fn run(
    mut app: App,
    service: BackendService,
    mut events: mpsc::UnboundedReceiver<BackendEvent>,
) -> Result<(), Box<dyn Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let (action_tx, mut action_rx) = mpsc::unbounded_channel();
    let dispatcher = AppActionDispatcher::new(action_tx);
    let mut input_rx = spawn_input_reader();
    let mut backend_open = true;

    let result = loop {
        if let Err(e) = terminal.draw(|frame| draw(frame, &mut app)) {
            break Err(e.into());
        }
        if app.ui.exit_requested {
            break Ok(());
        }

        let frame_delay = if app.needs_frame() {
            ACTIVE_FRAME
        } else {
            IDLE_FRAME
        };

        tokio::select! {
            event = events.recv(), if backend_open => {
                match event {
                    Some(event) => {
                        let actions = actions_for_event(&app, event);
                        run_actions(&mut app, actions, &dispatcher, &service);
                    }
                    None => {
                        // Backend went away; leave the transcript readable
                        // and let the user quit on their own time.
                        backend_open = false;
                        app.ui.messages.push_back(Message::app(
                            AppMessageKind::Error,
                            "The backend process exited.".to_string(),
                        ));
                        run_actions(
                            &mut app,
                            vec![AppAction::CancelStreaming],
                            &dispatcher,
                            &service,
                        );
                    }
                }
            }
            Some(action) = action_rx.recv() => {
                run_actions(&mut app, vec![action], &dispatcher, &service);
            }
            Some(key) = input_rx.recv() => {
                let actions = handle_key(&mut app, key);
                run_actions(&mut app, actions, &dispatcher, &service);
            }
            _ = tokio::time::sleep(frame_delay) => {
                let commands = app.pace_frame(Instant::now());
                execute_commands(commands, &dispatcher, &service);
            }
        }
    };

    service.shutdown();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

/// Forwards key presses from the blocking crossterm poll into the loop.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<KeyEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            match event::poll(Duration::from_millis(10)) {
                Ok(true) => {
                    if let Ok(Event::Key(key)) = event::read() {
                        if key.kind == KeyEventKind::Press && tx.send(key).is_err() {
                            return;
                        }
                    }
                }
                Ok(false) => tokio::time::sleep(Duration::from_millis(5)).await,
                Err(_) => return,
            }
        }
    });
    rx
}

fn run_actions(
    app: &mut App,
    actions: Vec<AppAction>,
    dispatcher: &AppActionDispatcher,
    service: &BackendService,
) {
    for action in actions {
        let commands = apply_action(app, action);
        execute_commands(commands, dispatcher, service);
    }
}

fn execute_commands(
    commands: Vec<AppCommand>,
    dispatcher: &AppActionDispatcher,
    service: &BackendService,
) {
    for command in commands {
        match command {
            AppCommand::SendBackend(request) => service.send(request),
            AppCommand::ScheduleTeardown { delay } => {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    dispatcher.dispatch(AppAction::TeardownPlanPanel);
                });
            }
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) -> Vec<AppAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match (key.code, ctrl) {
        (KeyCode::Char('c'), true) => {
            if app.stream.is_active() {
                vec![AppAction::CancelStreaming]
            } else {
                app.ui.exit_requested = true;
                Vec::new()
            }
        }
        (KeyCode::Esc, _) => {
            if app.stream.is_active() {
                vec![AppAction::CancelStreaming]
            } else {
                Vec::new()
            }
        }
        (KeyCode::Enter, false) => {
            if app.session.ui_blocked() {
                return Vec::new();
            }
            let text = app.ui.take_input_text();
            if text.trim().is_empty() {
                return Vec::new();
            }
            vec![AppAction::SubmitPrompt { text }]
        }
        (KeyCode::Char('a'), true) => vec![AppAction::ToggleAgentMode],
        (KeyCode::Char('t'), true) => vec![AppAction::TogglePlanAct],
        (KeyCode::Char('r'), true) => vec![AppAction::ApplyIndexingToggled {
            enabled: !app.session.is_indexing_enabled,
            has_index: None,
        }],
        (KeyCode::Char('d'), true) => {
            dump_transcript(app);
            Vec::new()
        }
        (KeyCode::PageUp, _) => {
            app.ui.scroll_up(10);
            Vec::new()
        }
        (KeyCode::PageDown, _) => {
            app.ui.scroll_down(10);
            Vec::new()
        }
        _ => {
            app.ui.input.input(key);
            Vec::new()
        }
    }
}

fn dump_transcript(app: &mut App) {
    let filename = transcript::default_dump_filename();
    match transcript::write_transcript(filename.as_ref(), &app.ui.messages) {
        Ok(()) => app.ui.set_status(format!("Transcript saved to {filename}")),
        Err(e) => {
            warn!("transcript dump failed: {e}");
            app.ui.set_status(format!("Could not save transcript: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::create_test_app;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn enter_submits_trimmed_input() {
        let mut app = create_test_app();
        app.ui.input.insert_str("  hello there  ");
        let actions = handle_key(&mut app, press(KeyCode::Enter, KeyModifiers::NONE));
        assert_eq!(
            actions,
            vec![AppAction::SubmitPrompt {
                text: "  hello there  ".to_string()
            }]
        );
        assert!(app.ui.input.lines().join("").is_empty(), "input box cleared");
    }

    #[test]
    fn enter_is_ignored_while_blocked() {
        let mut app = create_test_app();
        crate::core::app::apply_action(&mut app, AppAction::BeginResponse);
        app.ui.input.insert_str("queued");
        let actions = handle_key(&mut app, press(KeyCode::Enter, KeyModifiers::NONE));
        assert!(actions.is_empty());
    }

    #[test]
    fn ctrl_c_cancels_stream_before_exiting() {
        let mut app = create_test_app();
        crate::core::app::apply_action(&mut app, AppAction::BeginResponse);
        let actions = handle_key(&mut app, press(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(actions, vec![AppAction::CancelStreaming]);
        assert!(!app.ui.exit_requested);

        for action in actions {
            crate::core::app::apply_action(&mut app, action);
        }
        let actions = handle_key(&mut app, press(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(actions.is_empty());
        assert!(app.ui.exit_requested);
    }

    #[test]
    fn plain_typing_lands_in_the_textarea() {
        let mut app = create_test_app();
        let actions = handle_key(&mut app, press(KeyCode::Char('x'), KeyModifiers::NONE));
        assert!(actions.is_empty());
        assert_eq!(app.ui.input.lines().join(""), "x");
    }
}
