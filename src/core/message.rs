use serde::{Deserialize, Serialize};

/// Who (or what) a transcript entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TranscriptRole {
    User,
    Assistant,
    AppInfo,
    AppWarning,
    AppError,
}

impl TranscriptRole {
    pub fn as_str(self) -> &'static str {
        match self {
            TranscriptRole::User => "user",
            TranscriptRole::Assistant => "assistant",
            TranscriptRole::AppInfo => "app/info",
            TranscriptRole::AppWarning => "app/warning",
            TranscriptRole::AppError => "app/error",
        }
    }

    pub fn is_app(self) -> bool {
        matches!(
            self,
            TranscriptRole::AppInfo | TranscriptRole::AppWarning | TranscriptRole::AppError
        )
    }
}

/// Panel-originated notices rendered inline in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMessageKind {
    Info,
    Warning,
    Error,
}

impl AppMessageKind {
    pub fn role(self) -> TranscriptRole {
        match self {
            AppMessageKind::Info => TranscriptRole::AppInfo,
            AppMessageKind::Warning => TranscriptRole::AppWarning,
            AppMessageKind::Error => TranscriptRole::AppError,
        }
    }
}

/// How a message body is turned into display lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStyle {
    /// Full markup rendering.
    Markdown,
    /// Literal text. Planner narration streams in this style so partially
    /// received markup never flickers through the renderer.
    Plain,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: TranscriptRole,
    pub content: String,
    pub style: MessageStyle,
    /// Finished messages get the expensive render pass (syntax highlighting,
    /// link affordances). Streaming messages use the cheap path.
    pub polished: bool,
}

impl Message {
    pub fn user(content: String) -> Self {
        Self {
            role: TranscriptRole::User,
            content,
            style: MessageStyle::Markdown,
            polished: true,
        }
    }

    /// The empty assistant entry the streaming engine reveals text into.
    pub fn assistant_placeholder() -> Self {
        Self {
            role: TranscriptRole::Assistant,
            content: String::new(),
            style: MessageStyle::Markdown,
            polished: false,
        }
    }

    pub fn app(kind: AppMessageKind, content: String) -> Self {
        Self {
            role: kind.role(),
            content,
            style: MessageStyle::Markdown,
            polished: true,
        }
    }

    pub fn is_empty_assistant(&self) -> bool {
        self.role == TranscriptRole::Assistant && self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_kinds_map_to_app_roles() {
        assert_eq!(AppMessageKind::Info.role(), TranscriptRole::AppInfo);
        assert_eq!(AppMessageKind::Warning.role(), TranscriptRole::AppWarning);
        assert_eq!(AppMessageKind::Error.role(), TranscriptRole::AppError);
        assert!(TranscriptRole::AppWarning.is_app());
        assert!(!TranscriptRole::Assistant.is_app());
    }

    #[test]
    fn placeholder_starts_unpolished_and_empty() {
        let msg = Message::assistant_placeholder();
        assert!(msg.is_empty_assistant());
        assert!(!msg.polished);
        assert_eq!(msg.style, MessageStyle::Markdown);
    }
}
