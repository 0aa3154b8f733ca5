//! Frame composition for the panel.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

use crate::core::app::ui_state::ActivityKind;
use crate::core::app::{App, IndexingVisual};
use crate::core::message::{Message, MessageStyle, TranscriptRole};
use crate::ui::markdown;

const PULSE_FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

pub fn draw(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    app.ui.last_term_size = area.as_size();
    if area.height < 5 || area.width < 10 {
        // Too small to lay out; try again next frame.
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(3),
        ])
        .split(area);

    draw_transcript(frame, app, chunks[0]);
    draw_status(frame, app, chunks[1]);
    draw_input(frame, app, chunks[2]);
}

fn draw_transcript(frame: &mut Frame, app: &mut App, area: Rect) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    for msg in &app.ui.messages {
        lines.extend(message_lines(app, msg));
        lines.push(Line::from(""));
    }
    lines.extend(plan_lines(app));

    let total = lines.len() as u16;
    let max_scroll = total.saturating_sub(area.height);
    app.ui.max_scroll_offset = max_scroll;
    if app.ui.auto_scroll {
        app.ui.scroll_offset = max_scroll;
    } else {
        app.ui.scroll_offset = app.ui.scroll_offset.min(max_scroll);
    }

    let paragraph = Paragraph::new(lines).scroll((app.ui.scroll_offset, 0));
    frame.render_widget(paragraph, area);
}

fn message_lines(app: &App, msg: &Message) -> Vec<Line<'static>> {
    match msg.role {
        TranscriptRole::User => {
            let mut lines = Vec::new();
            for (index, text) in msg.content.lines().enumerate() {
                let mut spans = Vec::new();
                if index == 0 {
                    spans.push(Span::styled(
                        "You: ",
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ));
                }
                spans.push(Span::styled(
                    text.to_string(),
                    Style::default().fg(Color::Cyan),
                ));
                lines.push(Line::from(spans));
            }
            lines
        }
        TranscriptRole::Assistant => {
            if msg.style == MessageStyle::Plain || !app.ui.markdown_enabled {
                markdown::render_plain(&msg.content)
            } else {
                markdown::render_markdown(&msg.content, msg.polished && app.ui.syntax_enabled)
            }
        }
        TranscriptRole::AppInfo | TranscriptRole::AppWarning | TranscriptRole::AppError => {
            let (prefix, color) = match msg.role {
                TranscriptRole::AppWarning => ("warning: ", Color::Yellow),
                TranscriptRole::AppError => ("error: ", Color::Red),
                _ => ("", Color::DarkGray),
            };
            msg.content
                .lines()
                .enumerate()
                .map(|(index, text)| {
                    let mut spans = Vec::new();
                    if index == 0 && !prefix.is_empty() {
                        spans.push(Span::styled(
                            prefix,
                            Style::default().fg(color).add_modifier(Modifier::BOLD),
                        ));
                    }
                    spans.push(Span::styled(text.to_string(), Style::default().fg(color)));
                    Line::from(spans)
                })
                .collect()
        }
    }
}

fn plan_lines(app: &App) -> Vec<Line<'static>> {
    let Some(plan_state) = app.session.plan.as_ref() else {
        return Vec::new();
    };
    let mut lines = Vec::new();
    let marker = if plan_state.completed { "✓" } else { "…" };
    lines.push(Line::from(Span::styled(
        format!("Plan {marker} {}", plan_state.plan.title),
        Style::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::BOLD),
    )));
    for (index, step) in plan_state.plan.steps.iter().enumerate() {
        lines.push(Line::from(Span::styled(
            format!("  {}. {}", index + 1, step.description),
            Style::default().fg(Color::Magenta),
        )));
    }
    lines.push(Line::from(""));
    lines
}

fn draw_status(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans: Vec<Span<'static>> = Vec::new();

    if let Some(activity) = app.ui.activity {
        let tick = app.ui.pulse_start.elapsed().as_millis() / 80;
        let pulse = PULSE_FRAMES[(tick as usize) % PULSE_FRAMES.len()];
        let label = match activity {
            ActivityKind::ChatStream => "responding",
            ActivityKind::PlannerStream => "planning",
            ActivityKind::Indexing => "indexing",
        };
        spans.push(Span::styled(
            format!("{pulse} {label}  "),
            Style::default().fg(Color::Green),
        ));
    }

    spans.push(indexing_span(app));

    if app.ui.plan_act_visible {
        let mode = if app.session.is_agent_act_mode {
            "agent·act"
        } else {
            "agent·plan"
        };
        spans.push(Span::styled(
            format!("  {mode}"),
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ));
    } else if app.session.is_agent_mode_active {
        spans.push(Span::styled("  agent", Style::default().fg(Color::Magenta)));
    }

    if let Some(selection) = app.session.selection.as_ref() {
        spans.push(Span::styled(
            format!("  [{}]", fit_width(&selection.label(), 32)),
            Style::default().fg(Color::Blue),
        ));
    }

    if let Some(status) = app.ui.status.as_ref() {
        spans.push(Span::styled(
            format!("  {}", fit_width(status, 48)),
            Style::default().fg(Color::DarkGray),
        ));
    }

    let used = app.session.conversation_tokens + app.session.files_tokens;
    let gauge_color = if used > app.session.token_limit {
        Color::Red
    } else {
        Color::DarkGray
    };
    let gauge = format!("{used}/{} tokens", app.session.token_limit);
    let left_width: usize = spans.iter().map(|span| span.content.width()).sum();
    let pad = (area.width as usize)
        .saturating_sub(left_width)
        .saturating_sub(gauge.width());
    spans.push(Span::raw(" ".repeat(pad)));
    spans.push(Span::styled(gauge, Style::default().fg(gauge_color)));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn indexing_span(app: &App) -> Span<'static> {
    match app.ui.indexing_visual {
        IndexingVisual::Inactive => {
            Span::styled("retrieval off", Style::default().fg(Color::DarkGray))
        }
        IndexingVisual::Active(progress) => Span::styled(
            format!(
                "indexing {progress}% {}",
                fit_width(&app.session.indexing_message, 32)
            ),
            Style::default().fg(Color::Yellow),
        ),
        IndexingVisual::Ready => Span::styled("retrieval on", Style::default().fg(Color::Green)),
        IndexingVisual::Complete => {
            Span::styled("index ready", Style::default().fg(Color::Green))
        }
    }
}

fn draw_input(frame: &mut Frame, app: &mut App, area: Rect) {
    let title = if app.ui.ui_blocked {
        "Working… (Esc cancels)"
    } else {
        "Message (Enter sends)"
    };
    let border_color = if app.ui.ui_blocked {
        Color::DarkGray
    } else {
        Color::Cyan
    };
    app.ui.input.set_block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color))
            .title(title),
    );
    frame.render_widget(&app.ui.input, area);
}

/// Truncates `text` to at most `max` display columns, appending an ellipsis
/// when something was cut.
fn fit_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push('…');
    out
}
