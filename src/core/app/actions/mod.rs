mod modes;
mod streaming;

use std::time::Duration;

use tokio::sync::mpsc;

use super::App;
use crate::core::backend::{BackendRequest, Plan};

pub(crate) use streaming::finalize_stream;

/// State transitions applied to the panel. Produced by the dispatcher, by
/// keybindings, and by deferred timer tasks.
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    BeginResponse,
    AppendResponseChunk {
        content: String,
    },
    AppendPlannerNarration {
        text: String,
        step_no: u32,
    },
    MarkStreamEnded,
    StreamErrored {
        message: String,
    },
    CancelStreaming,
    SubmitPrompt {
        text: String,
    },
    ApplyIndexingProgress {
        percent: u8,
        message: String,
    },
    ApplyIndexingDone {
        has_index: Option<bool>,
    },
    ApplyIndexingToggled {
        enabled: bool,
        has_index: Option<bool>,
    },
    ApplyIndexingStatus {
        is_enabled: bool,
        has_index: Option<bool>,
    },
    PlanReady {
        plan: Plan,
    },
    PlanCompleted,
    TeardownPlanPanel,
    ToggleAgentMode,
    TogglePlanAct,
    SetAgentSelection {
        file: String,
        start_line: Option<u32>,
        end_line: Option<u32>,
        content: Option<String>,
    },
    ClearAgentSelection,
    ApplyContextSize {
        conversation_tokens: usize,
        files_tokens: usize,
    },
    SetStatus {
        message: String,
    },
    ClearStatus,
}

/// Side effects the panel loop carries out after applying an action batch.
/// Handlers never perform I/O themselves.
#[derive(Debug, PartialEq, Eq)]
pub enum AppCommand {
    SendBackend(BackendRequest),
    ScheduleTeardown { delay: Duration },
}

/// Clonable handle that deferred tasks use to feed actions back into the
/// panel loop's queue.
#[derive(Clone)]
pub struct AppActionDispatcher {
    tx: mpsc::UnboundedSender<AppAction>,
}

impl AppActionDispatcher {
    pub fn new(tx: mpsc::UnboundedSender<AppAction>) -> Self {
        Self { tx }
    }

    pub fn dispatch(&self, action: AppAction) {
        let _ = self.tx.send(action);
    }

    pub fn dispatch_many<I>(&self, actions: I)
    where
        I: IntoIterator<Item = AppAction>,
    {
        for action in actions {
            self.dispatch(action);
        }
    }
}

pub fn apply_actions(
    app: &mut App,
    actions: impl IntoIterator<Item = AppAction>,
) -> Vec<AppCommand> {
    let mut commands = Vec::new();
    for action in actions {
        commands.extend(apply_action(app, action));
    }
    commands
}

pub fn apply_action(app: &mut App, action: AppAction) -> Vec<AppCommand> {
    match action {
        AppAction::BeginResponse
        | AppAction::AppendResponseChunk { .. }
        | AppAction::AppendPlannerNarration { .. }
        | AppAction::MarkStreamEnded
        | AppAction::StreamErrored { .. }
        | AppAction::CancelStreaming
        | AppAction::SubmitPrompt { .. } => streaming::handle_streaming_action(app, action),

        AppAction::ApplyIndexingProgress { .. }
        | AppAction::ApplyIndexingDone { .. }
        | AppAction::ApplyIndexingToggled { .. }
        | AppAction::ApplyIndexingStatus { .. }
        | AppAction::PlanReady { .. }
        | AppAction::PlanCompleted
        | AppAction::TeardownPlanPanel
        | AppAction::ToggleAgentMode
        | AppAction::TogglePlanAct
        | AppAction::SetAgentSelection { .. }
        | AppAction::ClearAgentSelection
        | AppAction::ApplyContextSize { .. }
        | AppAction::SetStatus { .. }
        | AppAction::ClearStatus => modes::handle_mode_action(app, action),
    }
}
