//! The session state record and its derived visuals.
//!
//! Every mode flag the panel tracks lives in one mutable [`SessionState`]
//! value. Anything the renderer shows is a pure derivation over this record;
//! mutators go through [`crate::core::app::App::update_session`], which
//! normalizes dependent flags and re-runs the visual reconciler.

use crate::core::backend::Plan;
use crate::core::constants::DEFAULT_TOKEN_LIMIT;

/// The four mutually exclusive visual states of the indexing affordance.
///
/// Derived, never set directly: `is_indexing` always wins, then the
/// enabled/artifact pair picks between the remaining three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingVisual {
    /// Retrieval turned off.
    Inactive,
    /// An index build is running, with percent progress.
    Active(u8),
    /// Retrieval on, but no index has been built yet.
    Ready,
    /// Retrieval on and a built index exists.
    Complete,
}

/// Editor selection captured while agent mode is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionContext {
    pub file: String,
    pub lines: Option<(u32, u32)>,
    pub content: Option<String>,
}

impl SelectionContext {
    /// Short label for the status line: `src/lib.rs:10-24`, or just the file
    /// name once the range has been cleared.
    pub fn label(&self) -> String {
        match self.lines {
            Some((start, end)) => format!("{}:{}-{}", self.file, start, end),
            None => self.file.clone(),
        }
    }
}

/// A plan received from the backend plus its one-shot auto-apply latch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanState {
    pub plan: Plan,
    /// Set once `executePlannerAll` has been requested for this plan. Only a
    /// new plan arms the trigger again.
    pub auto_apply_requested: bool,
    pub completed: bool,
}

impl PlanState {
    pub fn new(plan: Plan) -> Self {
        Self {
            plan,
            auto_apply_requested: false,
            completed: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    /// A response is being generated or streamed.
    pub is_responding: bool,
    pub is_indexing: bool,
    pub indexing_progress: u8,
    pub indexing_message: String,
    /// Retrieval is turned on. Independent of `has_index_artifact`.
    pub is_indexing_enabled: bool,
    /// A previously built index exists for this workspace.
    pub has_index_artifact: bool,
    pub is_agent_mode_active: bool,
    /// Plan = false, act = true.
    pub is_agent_act_mode: bool,
    pub selection: Option<SelectionContext>,
    pub plan: Option<PlanState>,
    pub conversation_tokens: usize,
    pub files_tokens: usize,
    pub token_limit: usize,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            is_responding: false,
            is_indexing: false,
            indexing_progress: 0,
            indexing_message: String::new(),
            is_indexing_enabled: false,
            has_index_artifact: false,
            is_agent_mode_active: false,
            is_agent_act_mode: false,
            selection: None,
            plan: None,
            conversation_tokens: 0,
            files_tokens: 0,
            token_limit: DEFAULT_TOKEN_LIMIT,
        }
    }
}

impl SessionState {
    /// Input is rejected while a response streams or an index builds.
    pub fn ui_blocked(&self) -> bool {
        self.is_responding || self.is_indexing
    }

    pub fn indexing_visual(&self) -> IndexingVisual {
        if self.is_indexing {
            return IndexingVisual::Active(self.indexing_progress);
        }
        if !self.is_indexing_enabled {
            IndexingVisual::Inactive
        } else if self.has_index_artifact {
            IndexingVisual::Complete
        } else {
            IndexingVisual::Ready
        }
    }

    /// The plan/act toggle is shown only while agent mode has retrieval to
    /// work with; hidden means forced to plan.
    pub fn plan_act_visible(&self) -> bool {
        self.is_agent_mode_active && (self.is_indexing_enabled || self.is_indexing)
    }

    pub fn is_agent_selection_active(&self) -> bool {
        self.is_agent_mode_active
            && self
                .selection
                .as_ref()
                .is_some_and(|sel| sel.content.is_some())
    }

    /// Clears flags their preconditions no longer support. Runs after every
    /// mutation, before visuals are derived, so dependent state can never go
    /// stale.
    pub fn normalize(&mut self) {
        if !self.plan_act_visible() {
            self.is_agent_act_mode = false;
        }
        if !self.is_agent_mode_active {
            self.selection = None;
        }
        self.indexing_progress = self.indexing_progress.min(100);
    }
}
