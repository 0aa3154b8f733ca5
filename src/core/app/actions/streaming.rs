use std::time::Instant;

use tracing::debug;

use super::{App, AppAction, AppCommand};
use crate::core::app::stream::{FinishedStream, StreamRenderMode};
use crate::core::app::ui_state::ActivityKind;
use crate::core::backend::BackendRequest;
use crate::core::message::{AppMessageKind, Message, MessageStyle};

pub(super) fn handle_streaming_action(app: &mut App, action: AppAction) -> Vec<AppCommand> {
    match action {
        AppAction::BeginResponse => {
            begin_response(app);
            Vec::new()
        }
        AppAction::AppendResponseChunk { content } => {
            app.stream.append(Instant::now(), &content);
            Vec::new()
        }
        AppAction::AppendPlannerNarration { text, step_no } => {
            append_planner_narration(app, &text, step_no);
            Vec::new()
        }
        AppAction::MarkStreamEnded => mark_stream_ended(app),
        AppAction::StreamErrored { message } => stream_errored(app, message),
        AppAction::CancelStreaming => cancel_streaming(app),
        AppAction::SubmitPrompt { text } => submit_prompt(app, text),
        _ => unreachable!("non-streaming action routed to streaming handler"),
    }
}

fn begin_response(app: &mut App) {
    if app.stream.is_active() {
        // An error pass may have trimmed the placeholder; reseed it instead
        // of restarting the session.
        if !app.ui.has_assistant_placeholder() {
            app.ui.messages.push_back(Message::assistant_placeholder());
        }
        return;
    }
    app.stream.begin();
    app.ui.messages.push_back(Message::assistant_placeholder());
    app.ui.begin_streaming(ActivityKind::ChatStream);
    app.update_session(|state| state.is_responding = true);
}

fn append_planner_narration(app: &mut App, text: &str, step_no: u32) {
    if !app.stream.is_active() {
        begin_response(app);
        app.ui.begin_streaming(ActivityKind::PlannerStream);
    }
    if !app.stream.is_planner_mode() {
        app.stream.set_planner_mode(true);
        if let Some(msg) = app.ui.streaming_message_mut() {
            msg.style = MessageStyle::Plain;
        }
    }
    debug!(step_no, "planner narration buffered");
    app.stream.append(Instant::now(), text);
}

fn mark_stream_ended(app: &mut App) -> Vec<AppCommand> {
    if app.stream.mark_ended() {
        // Nothing left to drain (possibly a zero-length response); finalize
        // without waiting for another frame.
        finalize_stream(app)
    } else {
        Vec::new()
    }
}

fn cancel_streaming(app: &mut App) -> Vec<AppCommand> {
    let Some(finished) = app.stream.cancel() else {
        return Vec::new();
    };
    let mut commands = vec![AppCommand::SendBackend(BackendRequest::StopGeneration)];
    commands.extend(finalize_finished(app, finished, true));
    commands
}

fn stream_errored(app: &mut App, message: String) -> Vec<AppCommand> {
    let trimmed = message.trim();
    let text = if trimmed.is_empty() {
        "The backend reported a stream failure.".to_string()
    } else {
        trimmed.to_string()
    };

    let mut commands = Vec::new();
    if let Some(finished) = app.stream.cancel() {
        commands.extend(finalize_finished(app, finished, true));
    }
    app.ui
        .messages
        .push_back(Message::app(AppMessageKind::Error, text));
    commands
}

fn submit_prompt(app: &mut App, text: String) -> Vec<AppCommand> {
    let trimmed = text.trim();
    if trimmed.is_empty() || app.session.ui_blocked() {
        return Vec::new();
    }
    app.ui.messages.push_back(Message::user(trimmed.to_string()));
    app.ui.auto_scroll = true;
    app.recompute_usage();
    vec![AppCommand::SendBackend(BackendRequest::SendPrompt {
        text: trimmed.to_string(),
    })]
}

/// Runs finalization for a drained stream. Safe to call when no session is
/// active (the engine hands back nothing).
pub(crate) fn finalize_stream(app: &mut App) -> Vec<AppCommand> {
    match app.stream.finish() {
        Some(finished) => finalize_finished(app, finished, false),
        None => Vec::new(),
    }
}

fn finalize_finished(app: &mut App, finished: FinishedStream, interrupted: bool) -> Vec<AppCommand> {
    app.ui.end_streaming();

    if let Some(msg) = app.ui.streaming_message_mut() {
        msg.content = finished.revealed;
        msg.style = match finished.mode {
            StreamRenderMode::PlannerStreaming => MessageStyle::Plain,
            StreamRenderMode::Normal => MessageStyle::Markdown,
        };
        // The full render pass (syntax highlighting, link affordances) is
        // idempotent; flipping this twice changes nothing.
        msg.polished = true;
    }
    if app
        .ui
        .messages
        .back()
        .is_some_and(Message::is_empty_assistant)
    {
        app.ui.remove_trailing_empty_assistant();
    }
    app.ui.stream_interrupted = interrupted;

    // Agent-mode affordances re-evaluate here, not at streaming time; the
    // reconciler run inside update_session picks up whatever the mode flags
    // look like now.
    app.update_session(|state| state.is_responding = false);
    app.recompute_usage();

    vec![AppCommand::SendBackend(BackendRequest::RequestContextSize)]
}
