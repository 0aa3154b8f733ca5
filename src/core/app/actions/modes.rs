use tracing::debug;

use super::{App, AppAction, AppCommand};
use crate::core::app::state::{PlanState, SelectionContext};
use crate::core::backend::{BackendRequest, Plan};
use crate::core::constants::PLAN_TEARDOWN_DELAY;

pub(super) fn handle_mode_action(app: &mut App, action: AppAction) -> Vec<AppCommand> {
    match action {
        AppAction::ApplyIndexingProgress { percent, message } => {
            indexing_progress(app, percent, message);
            Vec::new()
        }
        AppAction::ApplyIndexingDone { has_index } => {
            indexing_done(app, has_index);
            Vec::new()
        }
        AppAction::ApplyIndexingToggled { enabled, has_index } => {
            app.update_session(|state| {
                state.is_indexing_enabled = enabled;
                if let Some(has) = has_index {
                    state.has_index_artifact = has;
                }
            });
            app.persist_modes();
            Vec::new()
        }
        AppAction::ApplyIndexingStatus {
            is_enabled,
            has_index,
        } => {
            // A status report describes what is already true; nothing to
            // persist.
            app.update_session(|state| {
                state.is_indexing_enabled = is_enabled;
                if let Some(has) = has_index {
                    state.has_index_artifact = has;
                }
            });
            Vec::new()
        }
        AppAction::PlanReady { plan } => plan_ready(app, plan),
        AppAction::PlanCompleted => plan_completed(app),
        AppAction::TeardownPlanPanel => {
            app.update_session(|state| state.plan = None);
            Vec::new()
        }
        AppAction::ToggleAgentMode => {
            app.update_session(|state| {
                state.is_agent_mode_active = !state.is_agent_mode_active;
            });
            app.recompute_usage();
            app.persist_modes();
            Vec::new()
        }
        AppAction::TogglePlanAct => toggle_plan_act(app),
        AppAction::SetAgentSelection {
            file,
            start_line,
            end_line,
            content,
        } => {
            set_selection(app, file, start_line, end_line, content);
            Vec::new()
        }
        AppAction::ClearAgentSelection => {
            clear_selection(app);
            Vec::new()
        }
        AppAction::ApplyContextSize {
            conversation_tokens,
            files_tokens,
        } => {
            app.update_session(|state| {
                state.conversation_tokens = conversation_tokens;
                state.files_tokens = files_tokens;
            });
            Vec::new()
        }
        AppAction::SetStatus { message } => {
            app.ui.set_status(message);
            Vec::new()
        }
        AppAction::ClearStatus => {
            app.ui.clear_status();
            Vec::new()
        }
        _ => unreachable!("non-mode action routed to mode handler"),
    }
}

fn indexing_progress(app: &mut App, percent: u8, message: String) {
    app.update_session(|state| {
        state.is_indexing = true;
        state.indexing_progress = percent;
        state.indexing_message = message;
    });
}

fn indexing_done(app: &mut App, has_index: Option<bool>) {
    app.update_session(|state| {
        state.is_indexing = false;
        state.indexing_progress = 0;
        state.indexing_message.clear();
        // A finished build leaves an artifact unless the backend says
        // otherwise.
        state.has_index_artifact = has_index.unwrap_or(true);
    });
}

fn toggle_plan_act(app: &mut App) -> Vec<AppCommand> {
    if !app.session.plan_act_visible() {
        return Vec::new();
    }
    let entering_act = !app.session.is_agent_act_mode;
    let mut fire_auto_apply = false;
    app.update_session(|state| {
        state.is_agent_act_mode = entering_act;
        if entering_act {
            if let Some(plan) = state.plan.as_mut() {
                if !plan.auto_apply_requested {
                    plan.auto_apply_requested = true;
                    fire_auto_apply = true;
                }
            }
        }
    });
    app.persist_modes();
    if fire_auto_apply {
        debug!("plan->act transition requests auto-apply");
        vec![AppCommand::SendBackend(BackendRequest::ExecutePlannerAll)]
    } else {
        Vec::new()
    }
}

fn plan_ready(app: &mut App, plan: Plan) -> Vec<AppCommand> {
    if app.stream.is_active() && app.stream.is_planner_mode() && !plan.title.is_empty() {
        // Swap the narration preamble for the plan title without stopping
        // the reveal animation.
        let header = format!("{}\n\n", plan.title);
        app.stream.replace_header(&header);
        if let Some(msg) = app.ui.streaming_message_mut() {
            msg.content = header;
        }
    }

    let in_act = app.session.is_agent_act_mode;
    let mut fire_auto_apply = false;
    app.update_session(|state| {
        let mut plan_state = PlanState::new(plan);
        if in_act {
            // Arriving while already in act mode is the second one-shot
            // trigger; the fresh plan's latch is unset by construction.
            plan_state.auto_apply_requested = true;
            fire_auto_apply = true;
        }
        state.plan = Some(plan_state);
    });

    if fire_auto_apply {
        debug!("plan arrived in act mode; requesting auto-apply");
        vec![AppCommand::SendBackend(BackendRequest::ExecutePlannerAll)]
    } else {
        Vec::new()
    }
}

fn plan_completed(app: &mut App) -> Vec<AppCommand> {
    let mut commands = Vec::new();

    // Backends that auto-applied the plan drop the narration stream on the
    // floor; close it out with a short completion note instead of leaving a
    // half-revealed transcript entry.
    if app.stream.is_active() && app.stream.is_planner_mode() {
        app.stream
            .stage_final_replacement("Plan executed.".to_string());
        if app.stream.mark_ended() {
            commands.extend(super::finalize_stream(app));
        }
    }

    app.update_session(|state| {
        if let Some(plan) = state.plan.as_mut() {
            plan.completed = true;
        }
    });

    if app.session.is_agent_act_mode {
        commands.push(AppCommand::ScheduleTeardown {
            delay: PLAN_TEARDOWN_DELAY,
        });
    }
    commands
}

fn set_selection(
    app: &mut App,
    file: String,
    start_line: Option<u32>,
    end_line: Option<u32>,
    content: Option<String>,
) {
    // Selections only matter to the agent; chat mode ignores them.
    if !app.session.is_agent_mode_active {
        return;
    }
    app.update_session(|state| {
        state.selection = Some(SelectionContext {
            file,
            lines: start_line.zip(end_line),
            content,
        });
    });
    app.recompute_usage();
}

fn clear_selection(app: &mut App) {
    app.update_session(|state| {
        if let Some(selection) = state.selection.as_mut() {
            // The file stays on the status line as ambient context; the
            // range and captured text go away.
            selection.lines = None;
            selection.content = None;
        }
    });
    app.recompute_usage();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::actions::apply_action;
    use crate::core::app::state::IndexingVisual;
    use crate::core::backend::PlanStep;
    use crate::utils::test_utils::create_test_app;

    fn plan(title: &str) -> Plan {
        Plan {
            title: title.to_string(),
            steps: vec![PlanStep {
                description: "step".to_string(),
            }],
        }
    }

    fn enable_plan_act(app: &mut App) {
        apply_action(app, AppAction::ToggleAgentMode);
        apply_action(
            app,
            AppAction::ApplyIndexingToggled {
                enabled: true,
                has_index: None,
            },
        );
        assert!(app.session.plan_act_visible());
    }

    #[test]
    fn indexing_events_walk_the_visual_states() {
        let mut app = create_test_app();
        assert_eq!(app.ui.indexing_visual, IndexingVisual::Inactive);

        apply_action(
            &mut app,
            AppAction::ApplyIndexingToggled {
                enabled: true,
                has_index: Some(false),
            },
        );
        assert_eq!(app.ui.indexing_visual, IndexingVisual::Ready);

        apply_action(
            &mut app,
            AppAction::ApplyIndexingProgress {
                percent: 42,
                message: "embedding src/".to_string(),
            },
        );
        assert_eq!(app.ui.indexing_visual, IndexingVisual::Active(42));
        assert!(app.ui.ui_blocked);

        apply_action(&mut app, AppAction::ApplyIndexingDone { has_index: None });
        assert_eq!(app.ui.indexing_visual, IndexingVisual::Complete);
        assert!(!app.ui.ui_blocked);

        apply_action(
            &mut app,
            AppAction::ApplyIndexingToggled {
                enabled: false,
                has_index: None,
            },
        );
        assert_eq!(app.ui.indexing_visual, IndexingVisual::Inactive);
    }

    #[test]
    fn ready_becomes_complete_without_passing_through_active() {
        let mut app = create_test_app();
        apply_action(
            &mut app,
            AppAction::ApplyIndexingStatus {
                is_enabled: true,
                has_index: Some(false),
            },
        );
        assert_eq!(app.ui.indexing_visual, IndexingVisual::Ready);

        // The artifact appears (e.g. synced from another window) while
        // enabled; no build ran in between.
        apply_action(
            &mut app,
            AppAction::ApplyIndexingStatus {
                is_enabled: true,
                has_index: Some(true),
            },
        );
        assert_eq!(app.ui.indexing_visual, IndexingVisual::Complete);
    }

    #[test]
    fn build_overrides_enabled_plus_artifact() {
        let mut app = create_test_app();
        apply_action(
            &mut app,
            AppAction::ApplyIndexingStatus {
                is_enabled: true,
                has_index: Some(true),
            },
        );
        apply_action(
            &mut app,
            AppAction::ApplyIndexingProgress {
                percent: 10,
                message: String::new(),
            },
        );
        assert_eq!(app.ui.indexing_visual, IndexingVisual::Active(10));
    }

    #[test]
    fn plan_to_act_fires_auto_apply_exactly_once_per_plan() {
        let mut app = create_test_app();
        enable_plan_act(&mut app);
        apply_action(&mut app, AppAction::PlanReady { plan: plan("v1") });

        let commands = apply_action(&mut app, AppAction::TogglePlanAct);
        assert_eq!(
            commands,
            vec![AppCommand::SendBackend(BackendRequest::ExecutePlannerAll)]
        );

        // Act -> plan -> act again: same plan, no second request.
        assert!(apply_action(&mut app, AppAction::TogglePlanAct).is_empty());
        assert!(apply_action(&mut app, AppAction::TogglePlanAct).is_empty());

        // A new plan arms the trigger again; arriving while already in act
        // mode fires it on arrival.
        let commands = apply_action(&mut app, AppAction::PlanReady { plan: plan("v2") });
        assert_eq!(
            commands,
            vec![AppCommand::SendBackend(BackendRequest::ExecutePlannerAll)]
        );
        assert!(apply_action(&mut app, AppAction::TogglePlanAct).is_empty());
    }

    #[test]
    fn toggle_is_inert_while_hidden() {
        let mut app = create_test_app();
        apply_action(&mut app, AppAction::PlanReady { plan: plan("v1") });
        let commands = apply_action(&mut app, AppAction::TogglePlanAct);
        assert!(commands.is_empty());
        assert!(!app.session.is_agent_act_mode);
    }

    #[test]
    fn disabling_retrieval_mid_act_falls_back_to_plan() {
        let mut app = create_test_app();
        enable_plan_act(&mut app);
        apply_action(&mut app, AppAction::TogglePlanAct);
        assert!(app.session.is_agent_act_mode);

        apply_action(
            &mut app,
            AppAction::ApplyIndexingToggled {
                enabled: false,
                has_index: None,
            },
        );
        assert!(!app.ui.plan_act_visible);
        assert!(!app.session.is_agent_act_mode, "hidden toggle forces plan");
    }

    #[test]
    fn plan_completed_in_act_mode_schedules_teardown() {
        let mut app = create_test_app();
        enable_plan_act(&mut app);
        apply_action(&mut app, AppAction::PlanReady { plan: plan("v1") });
        apply_action(&mut app, AppAction::TogglePlanAct);

        let commands = apply_action(&mut app, AppAction::PlanCompleted);
        assert_eq!(
            commands,
            vec![AppCommand::ScheduleTeardown {
                delay: PLAN_TEARDOWN_DELAY
            }]
        );
        assert!(app.session.plan.as_ref().is_some_and(|p| p.completed));

        apply_action(&mut app, AppAction::TeardownPlanPanel);
        assert!(app.session.plan.is_none());
    }

    #[test]
    fn plan_completed_in_plan_mode_keeps_the_panel() {
        let mut app = create_test_app();
        enable_plan_act(&mut app);
        apply_action(&mut app, AppAction::PlanReady { plan: plan("v1") });
        let commands = apply_action(&mut app, AppAction::PlanCompleted);
        assert!(commands.is_empty());
        assert!(app.session.plan.is_some());
    }

    #[test]
    fn selection_tracks_agent_mode_lifecycle() {
        let mut app = create_test_app();

        // Ignored while agent mode is off.
        apply_action(
            &mut app,
            AppAction::SetAgentSelection {
                file: "src/lib.rs".to_string(),
                start_line: Some(1),
                end_line: Some(4),
                content: Some("pub mod core;".to_string()),
            },
        );
        assert!(app.session.selection.is_none());

        apply_action(&mut app, AppAction::ToggleAgentMode);
        apply_action(
            &mut app,
            AppAction::SetAgentSelection {
                file: "src/lib.rs".to_string(),
                start_line: Some(1),
                end_line: Some(4),
                content: Some("pub mod core;".to_string()),
            },
        );
        assert!(app.session.is_agent_selection_active());
        assert!(app.session.files_tokens > 0);

        // Clearing keeps the file context, drops range and content.
        apply_action(&mut app, AppAction::ClearAgentSelection);
        assert!(!app.session.is_agent_selection_active());
        let selection = app.session.selection.as_ref().expect("file context");
        assert_eq!(selection.label(), "src/lib.rs");
        assert!(selection.content.is_none());
        assert_eq!(app.session.files_tokens, 0);

        // Leaving agent mode clears everything.
        apply_action(&mut app, AppAction::ToggleAgentMode);
        assert!(app.session.selection.is_none());
    }

    #[test]
    fn context_size_reading_overwrites_local_estimate() {
        let mut app = create_test_app();
        apply_action(
            &mut app,
            AppAction::ApplyContextSize {
                conversation_tokens: 512,
                files_tokens: 64,
            },
        );
        assert_eq!(app.session.conversation_tokens, 512);
        assert_eq!(app.session.files_tokens, 64);
    }
}
