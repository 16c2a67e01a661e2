//! Collaborator seams consumed by the pipeline.
//!
//! The engine itself performs no I/O: candles, the current instant, and
//! event-window awareness all arrive through these traits so a run is
//! reproducible at any fixed point in time.

use anyhow::Result;
use chrono::{DateTime, Utc};

use super::{CandleSeries, Frequency};
use crate::contracts::Symbol;

/// Default lookback window for history fetches, in days.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 10;

/// Supplies historical candles for a contract symbol.
///
/// Implementations return series sorted ascending by timestamp; the
/// series type re-validates on construction regardless.
pub trait CandleSource {
    fn fetch(
        &self,
        symbol: &Symbol,
        frequency: Frequency,
        lookback_days: u32,
    ) -> Result<CandleSeries>;
}

/// Wall-clock seam so classification is testable at a fixed instant.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// System UTC clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Scheduled-event predicate. Classification degrades to the
/// event-distorted regime while a window is active.
pub trait EventWindow {
    fn is_event_active(&self, now: DateTime<Utc>) -> bool;
}

/// Stand-in when no economic-calendar integration is wired up: never
/// reports an active window.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEvents;

impl EventWindow for NoEvents {
    fn is_event_active(&self, _now: DateTime<Utc>) -> bool {
        false
    }
}
