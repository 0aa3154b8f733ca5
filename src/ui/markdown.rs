//! Markdown rendering of transcript messages into ratatui lines.
//!
//! The renderer is called once per draw on whatever text has been revealed so
//! far, so it must behave on growing prefixes of a message: pulldown-cmark
//! parses whatever is there and unterminated constructs simply render with
//! their current contents. Syntax highlighting only runs for polished
//! (finished) messages; the streaming path stays cheap.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

/// Renders `text` as literal lines, one per newline. Planner narration and
/// markdown-disabled sessions use this path.
pub fn render_plain(text: &str) -> Vec<Line<'static>> {
    text.lines()
        .map(|line| Line::from(line.to_string()))
        .collect()
}

/// Renders markdown into display lines. `highlight` turns on the syntect
/// pass for fenced code blocks; safe to re-run on already-rendered content.
pub fn render_markdown(text: &str, highlight: bool) -> Vec<Line<'static>> {
    let mut renderer = MarkdownLines::new(highlight);
    for event in Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH) {
        renderer.push_event(event);
    }
    renderer.finish()
}

struct MarkdownLines {
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    highlight: bool,
    bold: usize,
    italic: usize,
    heading: bool,
    quote_depth: usize,
    list_depth: usize,
    code_block: Option<CodeCapture>,
}

struct CodeCapture {
    lang: String,
    body: String,
}

impl MarkdownLines {
    fn new(highlight: bool) -> Self {
        Self {
            lines: Vec::new(),
            spans: Vec::new(),
            highlight,
            bold: 0,
            italic: 0,
            heading: false,
            quote_depth: 0,
            list_depth: 0,
            code_block: None,
        }
    }

    fn text_style(&self) -> Style {
        let mut style = Style::default();
        if self.bold > 0 || self.heading {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.italic > 0 {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if self.quote_depth > 0 {
            style = style.fg(Color::DarkGray);
        }
        style
    }

    fn line_prefix(&self) -> String {
        let mut prefix = "> ".repeat(self.quote_depth);
        if self.list_depth > 0 {
            prefix.push_str(&"  ".repeat(self.list_depth - 1));
        }
        prefix
    }

    fn flush_line(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.spans);
        self.lines.push(Line::from(spans));
    }

    fn blank_line(&mut self) {
        self.flush_line();
        if !self.lines.is_empty() {
            self.lines.push(Line::from(""));
        }
    }

    fn push_text(&mut self, text: &str) {
        let style = self.text_style();
        for (index, part) in text.split('\n').enumerate() {
            if index > 0 {
                self.flush_line();
            }
            if part.is_empty() {
                continue;
            }
            if self.spans.is_empty() {
                let prefix = self.line_prefix();
                if !prefix.is_empty() {
                    self.spans
                        .push(Span::styled(prefix, Style::default().fg(Color::DarkGray)));
                }
            }
            self.spans.push(Span::styled(part.to_string(), style));
        }
    }

    fn push_event(&mut self, event: Event<'_>) {
        if let Some(capture) = self.code_block.as_mut() {
            // Everything inside a fenced block is captured verbatim until the
            // closing tag, then rendered as one unit.
            match event {
                Event::Text(text) => capture.body.push_str(&text),
                Event::End(TagEnd::CodeBlock) => self.end_code_block(),
                _ => {}
            }
            return;
        }

        match event {
            Event::Start(Tag::Paragraph) => {}
            Event::End(TagEnd::Paragraph) => self.blank_line(),
            Event::Start(Tag::Heading { .. }) => {
                self.blank_line();
                self.heading = true;
            }
            Event::End(TagEnd::Heading(_)) => {
                self.heading = false;
                self.blank_line();
            }
            Event::Start(Tag::BlockQuote(_)) => {
                self.flush_line();
                self.quote_depth += 1;
            }
            Event::End(TagEnd::BlockQuote(_)) => {
                self.flush_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                self.flush_line();
                let lang = match kind {
                    CodeBlockKind::Fenced(lang) => lang.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code_block = Some(CodeCapture {
                    lang,
                    body: String::new(),
                });
            }
            Event::End(TagEnd::CodeBlock) => self.end_code_block(),
            Event::Start(Tag::List(_)) => {
                self.flush_line();
                self.list_depth += 1;
            }
            Event::End(TagEnd::List(_)) => {
                self.flush_line();
                self.list_depth = self.list_depth.saturating_sub(1);
                if self.list_depth == 0 {
                    self.blank_line();
                }
            }
            Event::Start(Tag::Item) => {
                self.flush_line();
                let prefix = self.line_prefix();
                self.spans.push(Span::styled(
                    format!("{prefix}• "),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            Event::End(TagEnd::Item) => self.flush_line(),
            Event::Start(Tag::Emphasis) => self.italic += 1,
            Event::End(TagEnd::Emphasis) => self.italic = self.italic.saturating_sub(1),
            Event::Start(Tag::Strong) => self.bold += 1,
            Event::End(TagEnd::Strong) => self.bold = self.bold.saturating_sub(1),
            Event::Text(text) => self.push_text(&text),
            Event::Code(code) => {
                self.spans.push(Span::styled(
                    code.to_string(),
                    Style::default().fg(Color::Cyan),
                ));
            }
            Event::SoftBreak => self.push_text(" "),
            Event::HardBreak => self.flush_line(),
            Event::Rule => {
                self.flush_line();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(24),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            _ => {}
        }
    }

    fn end_code_block(&mut self) {
        let Some(capture) = self.code_block.take() else {
            return;
        };
        let highlighted = if self.highlight {
            highlight_code_block(&capture.lang, &capture.body)
        } else {
            None
        };
        match highlighted {
            Some(lines) => self.lines.extend(lines),
            None => {
                for line in capture.body.lines() {
                    self.lines.push(Line::from(Span::styled(
                        line.to_string(),
                        Style::default().fg(Color::Gray),
                    )));
                }
            }
        }
        self.lines.push(Line::from(""));
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        // An unterminated fence is a growing prefix mid-stream; show what we
        // have so far.
        self.end_code_block();
        self.flush_line();
        while self
            .lines
            .last()
            .is_some_and(|line| line.width() == 0)
        {
            self.lines.pop();
        }
        self.lines
    }
}

fn normalize_lang_hint(hint: &str) -> String {
    let lowered = hint.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "rs" => "rust".into(),
        "py" => "python".into(),
        "sh" | "zsh" | "shell" => "bash".into(),
        "js" => "javascript".into(),
        "ts" => "typescript".into(),
        "yml" => "yaml".into(),
        other => other.into(),
    }
}

fn highlight_code_block(lang: &str, code: &str) -> Option<Vec<Line<'static>>> {
    use std::sync::OnceLock;
    static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
    static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();
    let ps = SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines);
    let ts = THEME_SET.get_or_init(ThemeSet::load_defaults);
    let theme = ts.themes.get("base16-ocean.dark")?;

    let syntax = ps
        .find_syntax_by_token(&normalize_lang_hint(lang))
        .unwrap_or_else(|| ps.find_syntax_plain_text());
    let mut highlighter = HighlightLines::new(syntax, theme);

    let mut out: Vec<Line<'static>> = Vec::new();
    for line in LinesWithEndings::from(code) {
        let ranges = highlighter.highlight_line(line, ps).ok()?;
        let mut spans: Vec<Span<'static>> = Vec::new();
        for (style, fragment) in ranges {
            let fragment = fragment.strip_suffix('\n').unwrap_or(fragment);
            if fragment.is_empty() {
                continue;
            }
            let fg = style.foreground;
            spans.push(Span::styled(
                fragment.to_string(),
                Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b)),
            ));
        }
        if spans.is_empty() {
            out.push(Line::from(""));
        } else {
            out.push(Line::from(spans));
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_text(line: &Line<'_>) -> String {
        line.spans
            .iter()
            .map(|span| span.content.as_ref())
            .collect()
    }

    #[test]
    fn plain_rendering_is_literal() {
        let lines = render_plain("**not bold**\n`not code`");
        assert_eq!(lines.len(), 2);
        assert_eq!(line_text(&lines[0]), "**not bold**");
        assert_eq!(line_text(&lines[1]), "`not code`");
    }

    #[test]
    fn bold_and_heading_text_survives() {
        let lines = render_markdown("# Title\n\nSome **bold** text", false);
        let all: Vec<String> = lines.iter().map(line_text).collect();
        assert!(all.iter().any(|line| line.contains("Title")));
        assert!(all.iter().any(|line| line.contains("bold")));
    }

    #[test]
    fn list_items_get_bullets() {
        let lines = render_markdown("- first\n- second", false);
        let all: Vec<String> = lines.iter().map(line_text).collect();
        assert!(all.iter().any(|line| line.contains("• first")));
        assert!(all.iter().any(|line| line.contains("• second")));
    }

    #[test]
    fn fenced_code_renders_without_fences() {
        let lines = render_markdown("```rust\nlet x = 1;\n```", false);
        let all: Vec<String> = lines.iter().map(line_text).collect();
        assert!(all.iter().any(|line| line.contains("let x = 1;")));
        assert!(all.iter().all(|line| !line.contains("```")));
    }

    #[test]
    fn highlighted_code_keeps_its_text() {
        let lines = render_markdown("```rust\nfn main() {}\n```", true);
        let all: Vec<String> = lines.iter().map(line_text).collect();
        assert!(all.iter().any(|line| line.contains("fn main() {}")));
    }

    #[test]
    fn growing_prefixes_never_panic() {
        let full = "# Head\n\nSome **bold `code` and\n```rust\nlet x = 1;\n```\n- item";
        for (index, _) in full.char_indices() {
            let _ = render_markdown(&full[..index], true);
        }
        let _ = render_markdown(full, true);
    }

    #[test]
    fn unterminated_fence_shows_partial_body() {
        let lines = render_markdown("```rust\nlet x = 1;\nlet y", true);
        let all: Vec<String> = lines.iter().map(line_text).collect();
        assert!(all.iter().any(|line| line.contains("let x = 1;")));
        assert!(all.iter().any(|line| line.contains("let y")));
    }
}
