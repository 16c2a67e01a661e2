//! Market feature extraction.
//!
//! Produces the flat numeric record the classifier consumes: price
//! structure (VWAP, efficiency, pullbacks), volatility (ATR, realized
//! vol), and participation (volume vs. the expected curve).

pub mod calculator;

pub use calculator::{FeatureCalculator, MIN_BARS_1M, MIN_BARS_5M};

use serde::{Deserialize, Serialize};

/// Flat feature record produced once per classification.
///
/// `None` marks a feature whose inputs were insufficient or degenerate;
/// a missing feature never contributes to a downstream score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Features {
    /// Session-anchored volume-weighted average price.
    pub vwap: Option<f64>,
    /// Regression slope of the session VWAP, points/minute over price.
    pub vwap_slope: Option<f64>,
    /// (last close - VWAP) / VWAP.
    pub price_vs_vwap: Option<f64>,
    /// Wilder ATR(14) on 5-minute bars.
    pub atr_14_5m: Option<f64>,
    /// Relative ATR change vs. 10 bars earlier.
    pub atr_slope: Option<f64>,
    /// Realized vol over the last 20 five-minute bars.
    pub realized_vol_short: Option<f64>,
    /// Realized vol over the last 100 five-minute bars.
    pub realized_vol_long: Option<f64>,
    /// Short / long realized vol.
    pub rv_ratio: Option<f64>,
    /// Mean interval overlap/union of consecutive 5-minute bars, in [0, 1].
    pub bar_overlap_ratio: Option<f64>,
    /// Net move over total movement, signed, in [-1, 1].
    pub directional_efficiency: Option<f64>,
    /// Mean counter-trend retracement as a fraction of trend travel.
    pub avg_pullback_depth: Option<f64>,
    /// Session high minus session low since the open.
    pub session_range: Option<f64>,
    /// Session range z-scored against prior sessions.
    pub session_range_zscore: Option<f64>,
    /// Position of the last close inside the opening range, in [0, 1].
    pub opening_range_position: Option<f64>,
    /// Cumulative session volume over the expected curve value.
    pub volume_vs_expected: Option<f64>,
    /// Last-10-minute volume over the prior 10 minutes, minus 1.
    pub volume_acceleration: Option<f64>,
    /// Mean (high - low) / volume over recent 5-minute bars.
    pub range_per_volume: Option<f64>,
    /// Current ATR z-scored against its own rolling history.
    pub atr_zscore: Option<f64>,
}
