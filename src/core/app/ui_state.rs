use std::collections::VecDeque;
use std::time::Instant;

use ratatui::prelude::Size;
use tui_textarea::TextArea;

use crate::core::app::state::IndexingVisual;
use crate::core::config::Config;
use crate::core::message::{Message, TranscriptRole};

/// Background activity shown by the loading indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    /// Streaming a chat response.
    ChatStream,

    /// Streaming planner narration.
    PlannerStream,

    /// Building the workspace index.
    Indexing,
}

#[derive(Debug)]
pub struct UiState {
    pub messages: VecDeque<Message>,
    pub input: TextArea<'static>,
    pub scroll_offset: u16,
    /// Stick to the bottom of the transcript. Cleared when the user scrolls
    /// up, restored when they return to the bottom.
    pub auto_scroll: bool,
    /// Maximum scroll offset as of the last draw; scrolling clamps to it.
    pub max_scroll_offset: u16,
    pub activity: Option<ActivityKind>,
    pub pulse_start: Instant,
    pub stream_interrupted: bool,
    pub status: Option<String>,
    pub markdown_enabled: bool,
    pub syntax_enabled: bool,
    pub exit_requested: bool,
    pub last_term_size: Size,

    // Mirrors of derived session visuals, written only by the reconciler.
    pub indexing_visual: IndexingVisual,
    pub plan_act_visible: bool,
    pub ui_blocked: bool,
}

impl UiState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            messages: VecDeque::new(),
            input: TextArea::default(),
            scroll_offset: 0,
            auto_scroll: true,
            max_scroll_offset: 0,
            activity: None,
            pulse_start: Instant::now(),
            stream_interrupted: false,
            status: None,
            markdown_enabled: config.markdown.unwrap_or(true),
            syntax_enabled: config.syntax.unwrap_or(true),
            exit_requested: false,
            last_term_size: Size::new(0, 0),
            indexing_visual: IndexingVisual::Inactive,
            plan_act_visible: false,
            ui_blocked: false,
        }
    }

    pub fn begin_streaming(&mut self, kind: ActivityKind) {
        self.activity = Some(kind);
        self.pulse_start = Instant::now();
        self.stream_interrupted = false;
        self.auto_scroll = true;
    }

    pub fn end_streaming(&mut self) {
        if matches!(
            self.activity,
            Some(ActivityKind::ChatStream | ActivityKind::PlannerStream)
        ) {
            self.activity = None;
        }
    }

    /// Keeps the indexing indicator in step with the session without
    /// clobbering an active stream indicator.
    pub fn sync_indexing_activity(&mut self, is_indexing: bool) {
        match (is_indexing, self.activity) {
            (true, None) => self.activity = Some(ActivityKind::Indexing),
            (false, Some(ActivityKind::Indexing)) => self.activity = None,
            _ => {}
        }
    }

    /// The trailing assistant entry a stream reveals into, if present.
    pub fn streaming_message_mut(&mut self) -> Option<&mut Message> {
        self.messages
            .back_mut()
            .filter(|msg| msg.role == TranscriptRole::Assistant && !msg.polished)
    }

    pub fn has_assistant_placeholder(&self) -> bool {
        self.messages
            .back()
            .is_some_and(|msg| msg.role == TranscriptRole::Assistant && !msg.polished)
    }

    pub fn remove_trailing_empty_assistant(&mut self) {
        while self
            .messages
            .back()
            .is_some_and(Message::is_empty_assistant)
        {
            self.messages.pop_back();
        }
    }

    pub fn set_status(&mut self, message: String) {
        self.status = Some(message);
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.auto_scroll = false;
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll_offset = (self.scroll_offset + lines).min(self.max_scroll_offset);
        if self.scroll_offset >= self.max_scroll_offset {
            self.auto_scroll = true;
        }
    }

    pub fn take_input_text(&mut self) -> String {
        let text = self.input.lines().join("\n");
        self.input = TextArea::default();
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::MessageStyle;

    fn ui() -> UiState {
        UiState::from_config(&Config::default())
    }

    #[test]
    fn streaming_message_is_the_unpolished_tail() {
        let mut ui = ui();
        ui.messages.push_back(Message::user("hi".to_string()));
        assert!(ui.streaming_message_mut().is_none());

        ui.messages.push_back(Message::assistant_placeholder());
        assert!(ui.has_assistant_placeholder());
        let msg = ui.streaming_message_mut().expect("placeholder");
        msg.content.push_str("partial");
        msg.polished = true;
        assert!(ui.streaming_message_mut().is_none());
    }

    #[test]
    fn indexing_indicator_does_not_clobber_stream_indicator() {
        let mut ui = ui();
        ui.begin_streaming(ActivityKind::ChatStream);
        ui.sync_indexing_activity(true);
        assert_eq!(ui.activity, Some(ActivityKind::ChatStream));

        ui.end_streaming();
        ui.sync_indexing_activity(true);
        assert_eq!(ui.activity, Some(ActivityKind::Indexing));
        ui.sync_indexing_activity(false);
        assert_eq!(ui.activity, None);
    }

    #[test]
    fn scrolling_up_breaks_auto_scroll_and_bottom_restores_it() {
        let mut ui = ui();
        ui.max_scroll_offset = 10;
        ui.scroll_offset = 10;
        ui.scroll_up(3);
        assert!(!ui.auto_scroll);
        assert_eq!(ui.scroll_offset, 7);

        ui.scroll_down(5);
        assert_eq!(ui.scroll_offset, 10);
        assert!(ui.auto_scroll);
    }

    #[test]
    fn remove_trailing_empty_assistant_only_pops_empties() {
        let mut ui = ui();
        ui.messages.push_back(Message::user("q".to_string()));
        ui.messages.push_back(Message {
            role: TranscriptRole::Assistant,
            content: "kept".to_string(),
            style: MessageStyle::Markdown,
            polished: true,
        });
        ui.messages.push_back(Message::assistant_placeholder());
        ui.remove_trailing_empty_assistant();
        assert_eq!(ui.messages.len(), 2);
        assert_eq!(ui.messages.back().map(|m| m.content.as_str()), Some("kept"));
    }
}
