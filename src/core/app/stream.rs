//! Incremental response streaming: buffering, adaptive pacing, cancellation.
//!
//! Chunks arrive from the backend faster (or slower) than they should be
//! shown; the engine buffers them and reveals text once per display frame at
//! a rate that tracks the backend's own emission speed. The pacing loop is an
//! explicit state object driven by [`StreamEngine::step`] with a caller
//! supplied clock, so it can be exercised without a real frame scheduler.

use std::collections::VecDeque;
use std::time::Instant;

use unicode_segmentation::UnicodeSegmentation;

use crate::core::constants::{
    RATE_WINDOW, REVEAL_RATE_CEILING, REVEAL_RATE_FLOOR, REVEAL_RATE_INITIAL,
};

/// How revealed text is handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRenderMode {
    /// Markup rendering of the accumulated text.
    Normal,
    /// Literal text. Planner narration renders this way so partial markup
    /// never flickers through the display.
    PlannerStreaming,
}

#[derive(Debug, Clone, Copy)]
struct RateSample {
    at: Instant,
    chars: usize,
}

/// Per-request stream state, owned exclusively by [`StreamEngine`].
#[derive(Debug)]
struct StreamSession {
    raw_buffer: String,
    revealed: String,
    has_ended: bool,
    cancelled: bool,
    window: VecDeque<RateSample>,
    target_rate: f64,
    mode: StreamRenderMode,
    final_replacement: Option<String>,
    last_frame: Option<Instant>,
}

impl StreamSession {
    fn new() -> Self {
        Self {
            raw_buffer: String::new(),
            revealed: String::new(),
            has_ended: false,
            cancelled: false,
            window: VecDeque::new(),
            target_rate: REVEAL_RATE_INITIAL,
            mode: StreamRenderMode::Normal,
            final_replacement: None,
            last_frame: None,
        }
    }

    fn refresh_rate(&mut self, now: Instant) {
        while let Some(front) = self.window.front() {
            if now.duration_since(front.at) > RATE_WINDOW {
                self.window.pop_front();
            } else {
                break;
            }
        }
        let Some(oldest) = self.window.front() else {
            return;
        };
        let span = now.duration_since(oldest.at);
        if span.is_zero() {
            // A lone just-arrived sample spans no time; keep the last estimate.
            return;
        }
        let total: usize = self.window.iter().map(|sample| sample.chars).sum();
        self.target_rate =
            (total as f64 / span.as_secs_f64()).clamp(REVEAL_RATE_FLOOR, REVEAL_RATE_CEILING);
    }

    /// Moves up to `count` grapheme clusters from the raw buffer into the
    /// revealed text and returns them. Splitting on grapheme boundaries keeps
    /// combining sequences from tearing mid-reveal.
    fn reveal(&mut self, count: usize) -> String {
        let boundary = self
            .raw_buffer
            .grapheme_indices(true)
            .nth(count)
            .map(|(index, _)| index)
            .unwrap_or(self.raw_buffer.len());
        let rest = self.raw_buffer.split_off(boundary);
        let delta = std::mem::replace(&mut self.raw_buffer, rest);
        self.revealed.push_str(&delta);
        delta
    }
}

/// A session handed back for finalization, with the staged replacement (if
/// any) already applied.
#[derive(Debug)]
pub struct FinishedStream {
    pub revealed: String,
    pub cancelled: bool,
    pub mode: StreamRenderMode,
}

impl From<StreamSession> for FinishedStream {
    fn from(mut session: StreamSession) -> Self {
        let revealed = match session.final_replacement.take() {
            Some(text) => text,
            None => session.revealed,
        };
        Self {
            revealed,
            cancelled: session.cancelled,
            mode: session.mode,
        }
    }
}

/// Result of one pacing frame.
#[derive(Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// No active session; nothing is scheduled.
    Idle,
    /// Session still open; keep scheduling frames. `delta` holds the newly
    /// revealed text (possibly empty while the buffer under-runs).
    Running { delta: String },
    /// Buffer drained and the backend has ended; run finalization.
    Drained,
}

#[derive(Debug, Default)]
pub struct StreamEngine {
    session: Option<StreamSession>,
}

impl StreamEngine {
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_planner_mode(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.mode == StreamRenderMode::PlannerStreaming)
    }

    pub fn revealed(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.revealed.as_str())
    }

    pub fn target_rate(&self) -> Option<f64> {
        self.session.as_ref().map(|session| session.target_rate)
    }

    /// Allocates a fresh session. No-op when one is already active.
    pub fn begin(&mut self) -> bool {
        if self.session.is_some() {
            return false;
        }
        self.session = Some(StreamSession::new());
        true
    }

    /// Buffers a chunk and folds it into the rate estimate. Ignored when no
    /// session is open (e.g. the chunk raced a cancellation).
    pub fn append(&mut self, now: Instant, chunk: &str) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.cancelled || chunk.is_empty() {
            return;
        }
        session.raw_buffer.push_str(chunk);
        session.window.push_back(RateSample {
            at: now,
            chars: chunk.chars().count(),
        });
        session.refresh_rate(now);
    }

    /// Records backend completion. Returns true when the buffer is already
    /// drained, meaning finalization should run immediately (covers the
    /// zero-length response that never saw an `append`).
    pub fn mark_ended(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        session.has_ended = true;
        session.raw_buffer.is_empty()
    }

    /// Discards buffered text and takes the session for synchronous
    /// finalization. The second call finds no session and is a no-op.
    pub fn cancel(&mut self) -> Option<FinishedStream> {
        let mut session = self.session.take()?;
        session.cancelled = true;
        session.raw_buffer.clear();
        Some(FinishedStream::from(session))
    }

    pub fn set_planner_mode(&mut self, active: bool) {
        if let Some(session) = self.session.as_mut() {
            session.mode = if active {
                StreamRenderMode::PlannerStreaming
            } else {
                StreamRenderMode::Normal
            };
        }
    }

    /// Atomically swaps everything shown and buffered so far for `text`,
    /// leaving the end/cancel flags and the frame clock untouched. Used when
    /// a preamble must be replaced without stopping the animation.
    pub fn replace_header(&mut self, text: &str) {
        if let Some(session) = self.session.as_mut() {
            session.raw_buffer.clear();
            session.revealed.clear();
            session.revealed.push_str(text);
        }
    }

    /// Stages text that finalization will show instead of the revealed
    /// content; used for short-circuit textual results.
    pub fn stage_final_replacement(&mut self, text: String) {
        if let Some(session) = self.session.as_mut() {
            session.final_replacement = Some(text);
        }
    }

    /// One pacing frame. The first frame after `begin` only establishes the
    /// elapsed-time baseline and reveals nothing.
    pub fn step(&mut self, now: Instant) -> StepOutcome {
        let Some(session) = self.session.as_mut() else {
            return StepOutcome::Idle;
        };
        let Some(last) = session.last_frame else {
            session.last_frame = Some(now);
            return StepOutcome::Running {
                delta: String::new(),
            };
        };
        let elapsed = now.duration_since(last).as_secs_f64();
        session.last_frame = Some(now);

        let delta = if session.raw_buffer.is_empty() {
            String::new()
        } else {
            let allowed = ((session.target_rate * elapsed).floor() as usize).max(1);
            session.reveal(allowed)
        };

        if delta.is_empty() && session.raw_buffer.is_empty() && session.has_ended {
            StepOutcome::Drained
        } else {
            StepOutcome::Running { delta }
        }
    }

    /// Takes the session for finalization after [`StepOutcome::Drained`] (or
    /// an immediate end-on-empty). Idempotent: a destroyed session stays
    /// destroyed, so finalization can only run once.
    pub fn finish(&mut self) -> Option<FinishedStream> {
        self.session.take().map(FinishedStream::from)
    }
}
