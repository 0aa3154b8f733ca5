//! Shared constants used across the panel.

use std::time::Duration;

/// Lower clamp for the adaptive reveal rate, in characters per second.
pub const REVEAL_RATE_FLOOR: f64 = 40.0;

/// Upper clamp for the adaptive reveal rate, in characters per second.
pub const REVEAL_RATE_CEILING: f64 = 300.0;

/// Reveal rate assumed until enough chunk samples arrive to estimate one.
pub const REVEAL_RATE_INITIAL: f64 = 80.0;

/// Trailing interval of chunk samples the rate estimate is computed over.
pub const RATE_WINDOW: Duration = Duration::from_millis(2000);

/// How long the completed plan stays on screen before the panel tears it down
/// in act mode.
pub const PLAN_TEARDOWN_DELAY: Duration = Duration::from_secs(3);

/// Context budget used when the config does not override it.
pub const DEFAULT_TOKEN_LIMIT: usize = 12_000;
