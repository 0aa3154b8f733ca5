use std::path::PathBuf;
use std::time::Instant;

use tracing::warn;

use crate::core::config::Config;
use crate::core::tokens::{HeuristicEstimator, TokenEstimator};

pub mod actions;
pub mod state;
pub mod stream;
pub mod ui_state;

pub use actions::{
    apply_action, apply_actions, AppAction, AppActionDispatcher, AppCommand,
};
pub use state::{IndexingVisual, SessionState};
pub use stream::{StepOutcome, StreamEngine};
pub use ui_state::{ActivityKind, UiState};

/// The whole panel: session state record, presentation state, and the
/// streaming engine. Everything is mutated inline on the event loop; there is
/// no locking anywhere.
pub struct App {
    pub session: SessionState,
    pub ui: UiState,
    pub stream: StreamEngine,
    pub config: Config,
    /// Where mode flags persist to. `None` disables persistence (tests).
    pub config_path: Option<PathBuf>,
    estimator: Box<dyn TokenEstimator + Send>,
}

pub fn new_from_config(config: Config) -> App {
    new_with_config_path(config, crate::core::config::default_config_path())
}

pub fn new_with_config_path(config: Config, config_path: Option<PathBuf>) -> App {
    let mut session = SessionState::default();
    session.is_agent_mode_active = config.agent_mode.unwrap_or(false);
    session.is_indexing_enabled = config.indexing_enabled.unwrap_or(false);
    session.is_agent_act_mode = config.act_mode.unwrap_or(false);
    if let Some(limit) = config.token_limit {
        session.token_limit = limit;
    }
    session.normalize();

    let ui = UiState::from_config(&config);
    let mut app = App {
        session,
        ui,
        stream: StreamEngine::default(),
        config,
        config_path,
        estimator: Box::new(HeuristicEstimator),
    };
    app.resync_visuals();
    app
}

impl App {
    /// Applies a state mutation, then normalizes dependent flags and re-runs
    /// the visual reconciler. Every mutator goes through here so derived
    /// visuals can never go stale.
    pub fn update_session<F: FnOnce(&mut SessionState)>(&mut self, mutate: F) {
        mutate(&mut self.session);
        self.session.normalize();
        self.resync_visuals();
    }

    fn resync_visuals(&mut self) {
        self.ui.indexing_visual = self.session.indexing_visual();
        self.ui.plan_act_visible = self.session.plan_act_visible();
        self.ui.ui_blocked = self.session.ui_blocked();
        self.ui.sync_indexing_activity(self.session.is_indexing);
    }

    /// Whether the loop should keep scheduling animation frames.
    pub fn needs_frame(&self) -> bool {
        self.stream.is_active()
    }

    /// One animation frame: reveal paced text into the trailing assistant
    /// entry, finalizing once the stream drains. A missing placeholder is a
    /// transient presentation problem; the frame is skipped and retried
    /// later rather than failing the loop.
    pub fn pace_frame(&mut self, now: Instant) -> Vec<AppCommand> {
        if self.stream.is_active() && self.ui.streaming_message_mut().is_none() {
            return Vec::new();
        }
        match self.stream.step(now) {
            StepOutcome::Idle => Vec::new(),
            StepOutcome::Running { delta } => {
                if !delta.is_empty() {
                    if let Some(msg) = self.ui.streaming_message_mut() {
                        msg.content.push_str(&delta);
                    }
                }
                Vec::new()
            }
            StepOutcome::Drained => actions::finalize_stream(self),
        }
    }

    /// Local token estimate shown until the backend's authoritative reading
    /// arrives.
    pub fn recompute_usage(&mut self) {
        let mut conversation = 0;
        for msg in self.ui.messages.iter().filter(|msg| !msg.role.is_app()) {
            conversation += self.estimator.estimate(&msg.content);
        }
        let files = self
            .session
            .selection
            .as_ref()
            .and_then(|selection| selection.content.as_deref())
            .map(|content| self.estimator.estimate(content))
            .unwrap_or(0);
        self.update_session(|state| {
            state.conversation_tokens = conversation;
            state.files_tokens = files;
        });
    }

    /// Writes the current mode flags through to disk. A failed save is
    /// reported and otherwise ignored; the panel keeps running on the
    /// in-memory flags.
    pub fn persist_modes(&mut self) {
        self.config.agent_mode = Some(self.session.is_agent_mode_active);
        self.config.act_mode = Some(self.session.is_agent_act_mode);
        self.config.indexing_enabled = Some(self.session.is_indexing_enabled);
        self.config.markdown = Some(self.ui.markdown_enabled);
        self.config.syntax = Some(self.ui.syntax_enabled);
        let Some(path) = self.config_path.as_ref() else {
            return;
        };
        if let Err(e) = self.config.save_to_path(path) {
            warn!("failed to persist mode flags: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Message;
    use crate::utils::test_utils::create_test_app;

    #[test]
    fn startup_flags_come_from_config() {
        let config = Config {
            agent_mode: Some(true),
            indexing_enabled: Some(true),
            act_mode: Some(true),
            token_limit: Some(9000),
            ..Config::default()
        };
        let app = new_from_config(config);
        assert!(app.session.is_agent_mode_active);
        assert!(app.session.is_indexing_enabled);
        assert!(app.session.is_agent_act_mode, "act survives: toggle visible");
        assert_eq!(app.session.token_limit, 9000);
        assert!(app.ui.plan_act_visible);
    }

    #[test]
    fn act_mode_from_config_is_dropped_when_toggle_hidden() {
        let config = Config {
            agent_mode: Some(false),
            act_mode: Some(true),
            ..Config::default()
        };
        let app = new_from_config(config);
        assert!(!app.session.is_agent_act_mode);
    }

    #[test]
    fn usage_counts_transcript_but_not_app_notices() {
        let mut app = create_test_app();
        app.ui.messages.push_back(Message::user("abcdefgh".to_string()));
        app.ui.messages.push_back(Message::app(
            crate::core::message::AppMessageKind::Info,
            "ignored by the gauge".to_string(),
        ));
        app.recompute_usage();
        assert_eq!(app.session.conversation_tokens, 2);
        assert_eq!(app.session.files_tokens, 0);
    }

    #[test]
    fn pace_frame_with_no_session_is_idle() {
        let mut app = create_test_app();
        assert!(app.pace_frame(Instant::now()).is_empty());
        assert!(!app.needs_frame());
    }
}
