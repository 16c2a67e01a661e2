//! Per-instrument calibration for regime detection.
//!
//! ES and NQ need different thresholds: NQ runs hotter, produces more
//! false breakouts, and demands stricter confirmation before a structure
//! read is trusted. Every knob the classifier consults lives in one
//! record so an instrument swap is a single reference swap.

use crate::contracts::Instrument;

/// Piecewise-linear expected-volume curve: (minutes since the open,
/// cumulative fraction of the full-session volume).
pub type VolumeCurve = &'static [(f64, f64)];

/// Instrument-specific thresholds for feature scoring and state mapping.
#[derive(Debug, Clone)]
pub struct Calibration {
    pub instrument: Instrument,

    /// Minimum bar overlap for a balance point.
    pub balance_overlap_threshold: f64,
    /// Minimum |directional efficiency| for an imbalance point.
    pub imbalance_efficiency_threshold: f64,
    /// |VWAP slope| magnitude treated as strong directional drift.
    pub vwap_slope_strong: f64,

    /// ATR slope at or above which volatility is expanding.
    pub atr_expanding_slope: f64,
    /// ATR slope at or below which volatility is compressing.
    pub atr_compressing_slope: f64,
    /// ATR z-score at or above which volatility is extreme.
    pub atr_extreme_zscore: f64,
    /// RV ratio at or above which short-horizon vol outruns long.
    pub rv_ratio_expanding: f64,

    /// volume_vs_expected at or above which participation is heavy.
    pub participation_heavy: f64,
    /// volume_vs_expected at or below which participation is thin.
    pub participation_thin: f64,

    /// Efficiency floor for a clean trend.
    pub trend_quality_clean: f64,
    /// Efficiency floor for a weak trend outside Trend primaries.
    pub trend_quality_weak: f64,
    /// (efficiency, ATR z-score) floors for an extreme trend.
    pub trend_quality_extreme: (f64, f64),

    /// Typical full-session volume, in contracts.
    pub expected_session_volume: f64,
    /// Cumulative expected-volume curve over the regular session.
    pub expected_volume_curve: VolumeCurve,
}

impl Calibration {
    /// Calibration record for an instrument.
    pub fn for_instrument(instrument: Instrument) -> &'static Calibration {
        match instrument {
            Instrument::Es => &ES_CAL,
            Instrument::Nq => &NQ_CAL,
        }
    }

    /// Expected cumulative session volume at `minutes` past the open.
    ///
    /// `None` at or before the bell, when no volume is expected yet.
    pub fn expected_volume(&self, minutes: i64) -> Option<f64> {
        if minutes <= 0 {
            return None;
        }
        let fraction = curve_fraction(self.expected_volume_curve, minutes as f64);
        let expected = fraction * self.expected_session_volume;
        (expected > 0.0).then_some(expected)
    }
}

/// Linear interpolation over the curve, clamped at both ends.
fn curve_fraction(curve: VolumeCurve, minutes: f64) -> f64 {
    let Some(&(first_m, first_v)) = curve.first() else {
        return 0.0;
    };
    if minutes <= first_m {
        return first_v;
    }

    for pair in curve.windows(2) {
        let (m0, v0) = pair[0];
        let (m1, v1) = pair[1];
        if minutes <= m1 {
            return v0 + (minutes - m0) / (m1 - m0) * (v1 - v0);
        }
    }

    curve.last().map(|&(_, v)| v).unwrap_or(0.0)
}

// Cumulative fractions condensed from observed 15-minute volume buckets:
// front-loaded open, lunch trough, power-hour ramp into the close.
const ES_VOLUME_CURVE: VolumeCurve = &[
    (0.0, 0.0),
    (15.0, 0.05),
    (30.0, 0.10),
    (60.0, 0.18),
    (120.0, 0.33),
    (180.0, 0.43),
    (270.0, 0.52),
    (330.0, 0.62),
    (390.0, 0.75),
    (420.0, 0.84),
    (450.0, 1.0),
];

const NQ_VOLUME_CURVE: VolumeCurve = &[
    (0.0, 0.0),
    (15.0, 0.055),
    (30.0, 0.105),
    (60.0, 0.19),
    (120.0, 0.33),
    (180.0, 0.42),
    (270.0, 0.51),
    (330.0, 0.61),
    (390.0, 0.74),
    (420.0, 0.83),
    (450.0, 1.0),
];

/// E-mini S&P 500. Cleaner balance behavior, more reliable structure.
pub static ES_CAL: Calibration = Calibration {
    instrument: Instrument::Es,
    balance_overlap_threshold: 0.55,
    imbalance_efficiency_threshold: 0.45,
    vwap_slope_strong: 1.5e-5,
    atr_expanding_slope: 0.10,
    atr_compressing_slope: -0.10,
    atr_extreme_zscore: 2.0,
    rv_ratio_expanding: 1.2,
    participation_heavy: 1.3,
    participation_thin: 0.7,
    trend_quality_clean: 0.60,
    trend_quality_weak: 0.50,
    trend_quality_extreme: (0.80, 1.5),
    expected_session_volume: 1_890_000.0,
    expected_volume_curve: ES_VOLUME_CURVE,
};

/// E-mini NASDAQ-100. Higher volatility and more false breakouts, so
/// trend confirmation is stricter across the board.
pub static NQ_CAL: Calibration = Calibration {
    instrument: Instrument::Nq,
    balance_overlap_threshold: 0.60,
    imbalance_efficiency_threshold: 0.55,
    vwap_slope_strong: 2.2e-5,
    atr_expanding_slope: 0.10,
    atr_compressing_slope: -0.10,
    atr_extreme_zscore: 2.0,
    rv_ratio_expanding: 1.3,
    participation_heavy: 1.3,
    participation_thin: 0.7,
    trend_quality_clean: 0.70,
    trend_quality_weak: 0.55,
    trend_quality_extreme: (0.85, 1.5),
    expected_session_volume: 2_230_000.0,
    expected_volume_curve: NQ_VOLUME_CURVE,
};
