//! Routing policy from backend events to panel actions.
//!
//! Mostly a one-to-one mapping; the interesting part is what gets dropped.
//! Backend events and user cancellation race freely, so stream events with no
//! session to land in are discarded here, and planner narration never reaches
//! the engine while act mode would throw it away mid-stream.

use tracing::debug;

use crate::core::app::{App, AppAction};
use crate::core::backend::BackendEvent;

pub fn actions_for_event(app: &App, event: BackendEvent) -> Vec<AppAction> {
    match event {
        BackendEvent::ResponsePlaceholderRequested => vec![AppAction::BeginResponse],
        BackendEvent::ResponseChunk { text } => {
            if !app.stream.is_active() {
                debug!("dropping response chunk with no active stream");
                return Vec::new();
            }
            vec![AppAction::AppendResponseChunk { content: text }]
        }
        BackendEvent::StreamEnded => {
            if !app.stream.is_active() {
                debug!("dropping stream end with no active stream");
                return Vec::new();
            }
            vec![AppAction::MarkStreamEnded]
        }
        BackendEvent::StreamError { message } => vec![AppAction::StreamErrored { message }],
        BackendEvent::IndexingProgress { percent, message } => {
            vec![AppAction::ApplyIndexingProgress { percent, message }]
        }
        BackendEvent::IndexingDone { has_index } => {
            vec![AppAction::ApplyIndexingDone { has_index }]
        }
        BackendEvent::IndexingToggled { enabled, has_index } => {
            vec![AppAction::ApplyIndexingToggled { enabled, has_index }]
        }
        BackendEvent::IndexingStatus {
            is_enabled,
            has_index,
        } => vec![AppAction::ApplyIndexingStatus {
            is_enabled,
            has_index,
        }],
        BackendEvent::PlannerNarrationChunk { text, step_no } => {
            // Act mode auto-applies the plan; narration would be discarded
            // mid-stream. Without retrieval there is no planner at all.
            if app.session.is_agent_act_mode || !app.session.is_indexing_enabled {
                debug!(step_no, "suppressing planner narration");
                return Vec::new();
            }
            vec![AppAction::AppendPlannerNarration { text, step_no }]
        }
        BackendEvent::PlanReady { plan } => vec![AppAction::PlanReady { plan }],
        BackendEvent::PlanCompleted => vec![AppAction::PlanCompleted],
        BackendEvent::SelectionChanged {
            file,
            start_line,
            end_line,
            content,
        } => vec![AppAction::SetAgentSelection {
            file,
            start_line,
            end_line,
            content,
        }],
        BackendEvent::SelectionCleared => vec![AppAction::ClearAgentSelection],
        BackendEvent::ContextSize {
            conversation_tokens,
            files_tokens,
        } => vec![AppAction::ApplyContextSize {
            conversation_tokens,
            files_tokens,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::apply_action;
    use crate::utils::test_utils::create_test_app;

    #[test]
    fn chunks_after_cancel_produce_no_actions() {
        let mut app = create_test_app();
        let actions = actions_for_event(&app, BackendEvent::ResponsePlaceholderRequested);
        for action in actions {
            apply_action(&mut app, action);
        }
        assert!(app.stream.is_active());

        apply_action(&mut app, AppAction::CancelStreaming);

        // The backend had chunks and an end marker in flight.
        assert!(actions_for_event(
            &app,
            BackendEvent::ResponseChunk {
                text: "late".to_string()
            }
        )
        .is_empty());
        assert!(actions_for_event(&app, BackendEvent::StreamEnded).is_empty());
    }

    #[test]
    fn narration_is_suppressed_in_act_mode() {
        let mut app = create_test_app();
        for action in [
            AppAction::ToggleAgentMode,
            AppAction::ApplyIndexingToggled {
                enabled: true,
                has_index: None,
            },
            AppAction::TogglePlanAct,
        ] {
            apply_action(&mut app, action);
        }
        assert!(app.session.is_agent_act_mode);

        let actions = actions_for_event(
            &app,
            BackendEvent::PlannerNarrationChunk {
                text: "step 1".to_string(),
                step_no: 1,
            },
        );
        assert!(actions.is_empty());
        assert!(!app.stream.is_active(), "the engine never saw the event");
    }

    #[test]
    fn narration_is_suppressed_without_retrieval() {
        let mut app = create_test_app();
        apply_action(&mut app, AppAction::ToggleAgentMode);
        assert!(!app.session.is_indexing_enabled);

        let actions = actions_for_event(
            &app,
            BackendEvent::PlannerNarrationChunk {
                text: "step 1".to_string(),
                step_no: 1,
            },
        );
        assert!(actions.is_empty());
    }

    #[test]
    fn narration_flows_in_plan_mode_with_retrieval() {
        let mut app = create_test_app();
        apply_action(&mut app, AppAction::ToggleAgentMode);
        apply_action(
            &mut app,
            AppAction::ApplyIndexingToggled {
                enabled: true,
                has_index: None,
            },
        );

        let actions = actions_for_event(
            &app,
            BackendEvent::PlannerNarrationChunk {
                text: "step 1".to_string(),
                step_no: 1,
            },
        );
        assert_eq!(
            actions,
            vec![AppAction::AppendPlannerNarration {
                text: "step 1".to_string(),
                step_no: 1
            }]
        );
    }

    #[test]
    fn plain_events_map_one_to_one() {
        let app = create_test_app();
        assert_eq!(
            actions_for_event(
                &app,
                BackendEvent::IndexingProgress {
                    percent: 7,
                    message: "scanning".to_string()
                }
            ),
            vec![AppAction::ApplyIndexingProgress {
                percent: 7,
                message: "scanning".to_string()
            }]
        );
        assert_eq!(
            actions_for_event(&app, BackendEvent::PlanCompleted),
            vec![AppAction::PlanCompleted]
        );
    }
}
