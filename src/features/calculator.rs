//! Feature calculation engine.
//!
//! Derives the full feature vector from the 1-minute and 5-minute
//! series. Price-structure and participation features read the 1-minute
//! session bars; volatility and range features read the 5-minute series.
//! Every computation is a pure pass over the inputs: short windows and
//! zero denominators yield missing features, never errors.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use statrs::statistics::Statistics;
use tracing::debug;

use crate::calibration::Calibration;
use crate::data::{dec_f64, Candle, CandleSeries, Frequency};
use crate::error::{EngineError, EngineResult};
use crate::session::{self, SessionContext, SessionPhase};

use super::Features;

/// Minimum 1-minute bars for any classification.
pub const MIN_BARS_1M: usize = 60;
/// Minimum 5-minute bars for any classification.
pub const MIN_BARS_5M: usize = 20;

const ATR_PERIOD: usize = 14;
const ATR_SLOPE_LOOKBACK: usize = 10;
const ATR_ZSCORE_WINDOW: usize = 200;
const ATR_ZSCORE_MIN: usize = 30;
const VWAP_SLOPE_WINDOW: usize = 30;
const EFFICIENCY_WINDOW: usize = 60;
const OVERLAP_WINDOW: usize = 24;
const RV_SHORT_WINDOW: usize = 20;
const RV_LONG_WINDOW: usize = 100;
const RV_LONG_MIN: usize = 40;
const RANGE_ZSCORE_SESSIONS: usize = 20;
const RANGE_PER_VOLUME_WINDOW: usize = 12;
const VOLUME_ACCEL_WINDOW: usize = 10;
const PULLBACK_ATR_FACTOR: f64 = 0.1;

/// Calculates market features from candle history.
pub struct FeatureCalculator<'a> {
    calibration: &'a Calibration,
}

impl<'a> FeatureCalculator<'a> {
    pub fn new(calibration: &'a Calibration) -> Self {
        Self { calibration }
    }

    /// Compute the full feature vector as of the session context instant.
    pub fn compute(
        &self,
        candles_1m: &CandleSeries,
        candles_5m: &CandleSeries,
        session: &SessionContext,
    ) -> EngineResult<Features> {
        if candles_1m.len() < MIN_BARS_1M {
            return Err(EngineError::InsufficientData {
                frequency: Frequency::OneMinute,
                observed: candles_1m.len(),
                required: MIN_BARS_1M,
            });
        }
        if candles_5m.len() < MIN_BARS_5M {
            return Err(EngineError::InsufficientData {
                frequency: Frequency::FiveMinute,
                observed: candles_5m.len(),
                required: MIN_BARS_5M,
            });
        }

        let bars_1m = candles_1m.candles();
        let bars_5m = candles_5m.candles();
        let today = session::session_date(session.as_of);
        let session_1m: Vec<&Candle> = bars_1m.iter().filter(|c| in_session(c, today)).collect();
        let session_5m: Vec<&Candle> = bars_5m.iter().filter(|c| in_session(c, today)).collect();

        let last_close = dec_f64(bars_1m[bars_1m.len() - 1].close);

        // Session VWAP family.
        let vwap_series = session_vwap_series(&session_1m);
        let vwap = vwap_series.last().copied();
        let vwap_slope = if vwap_series.len() >= VWAP_SLOPE_WINDOW && last_close > 0.0 {
            let window = &vwap_series[vwap_series.len() - VWAP_SLOPE_WINDOW..];
            Some(least_squares_slope(window) / last_close)
        } else {
            None
        };
        let price_vs_vwap = vwap
            .filter(|v| *v != 0.0)
            .map(|v| (last_close - v) / v);

        // ATR family on the 5-minute series.
        let atr_series = wilder_atr_series(bars_5m, ATR_PERIOD);
        let atr_14_5m = atr_series.last().copied();
        let atr_slope = atr_relative_change(&atr_series, ATR_SLOPE_LOOKBACK);
        let atr_zscore = trailing_zscore(&atr_series, ATR_ZSCORE_WINDOW, ATR_ZSCORE_MIN);

        // Realized volatility at two horizons.
        let realized_vol_short = realized_vol(&bars_5m[bars_5m.len() - RV_SHORT_WINDOW..]);
        let realized_vol_long = if bars_5m.len() >= RV_LONG_MIN {
            realized_vol(&bars_5m[bars_5m.len().saturating_sub(RV_LONG_WINDOW)..])
        } else {
            None
        };
        let rv_ratio = match (realized_vol_short, realized_vol_long) {
            (Some(short), Some(long)) if long > 0.0 => Some(short / long),
            _ => None,
        };

        // Bar structure.
        let overlap_window = &bars_5m[bars_5m.len().saturating_sub(OVERLAP_WINDOW)..];
        let bar_overlap_ratio = mean_overlap_ratio(overlap_window);

        let efficiency_window = &bars_1m[bars_1m.len() - EFFICIENCY_WINDOW..];
        let directional_efficiency = directional_efficiency(efficiency_window);
        let avg_pullback_depth =
            atr_14_5m.and_then(|atr| avg_pullback_depth(efficiency_window, atr));

        // Session range vs. prior sessions.
        let session_range = range_of(&session_5m);
        let prior_ranges = prior_session_ranges(bars_5m, today);
        let session_range_zscore = session_range.and_then(|range| {
            let start = prior_ranges.len().saturating_sub(RANGE_ZSCORE_SESSIONS);
            zscore_against(range, &prior_ranges[start..])
        });

        // Opening range position, only meaningful inside the session.
        let opening_range_position = if session.phase.is_regular() {
            opening_range(&session_5m).and_then(|(high, low)| {
                let width = high - low;
                (width > 0.0).then(|| ((last_close - low) / width).clamp(0.0, 1.0))
            })
        } else {
            None
        };

        // Participation.
        let session_volume: f64 = session_1m.iter().map(|c| c.volume as f64).sum();
        let volume_vs_expected = self
            .calibration
            .expected_volume(session.minutes_since_open)
            .map(|expected| session_volume / expected);
        let volume_acceleration = volume_acceleration(bars_1m, VOLUME_ACCEL_WINDOW);
        let range_per_volume = range_per_volume(
            &bars_5m[bars_5m.len().saturating_sub(RANGE_PER_VOLUME_WINDOW)..],
        );

        let features = Features {
            vwap,
            vwap_slope,
            price_vs_vwap,
            atr_14_5m,
            atr_slope,
            realized_vol_short,
            realized_vol_long,
            rv_ratio,
            bar_overlap_ratio,
            directional_efficiency,
            avg_pullback_depth,
            session_range,
            session_range_zscore,
            opening_range_position,
            volume_vs_expected,
            volume_acceleration,
            range_per_volume,
            atr_zscore,
        };

        debug!(
            instrument = %self.calibration.instrument,
            vwap = ?features.vwap,
            atr = ?features.atr_14_5m,
            efficiency = ?features.directional_efficiency,
            overlap = ?features.bar_overlap_ratio,
            "features calculated"
        );

        Ok(features)
    }
}

/// Whether a candle belongs to today's regular session.
fn in_session(candle: &Candle, today: NaiveDate) -> bool {
    session::session_date(candle.timestamp) == today
        && session::is_regular_session(candle.timestamp)
}

/// Session-to-date VWAP after each bar. Bars before any session volume
/// has printed produce no entry, so a zero-volume session yields an
/// empty series.
fn session_vwap_series(bars: &[&Candle]) -> Vec<f64> {
    let mut price_volume = 0.0;
    let mut volume = 0.0;
    let mut series = Vec::with_capacity(bars.len());

    for bar in bars {
        price_volume += bar.typical_price() * bar.volume as f64;
        volume += bar.volume as f64;
        if volume > 0.0 {
            series.push(price_volume / volume);
        }
    }

    series
}

/// Least-squares slope of `values` against their index (units per bar).
fn least_squares_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        numerator += dx * (y - y_mean);
        denominator += dx * dx;
    }

    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn true_range(bar: &Candle, prev: &Candle) -> f64 {
    let high = dec_f64(bar.high);
    let low = dec_f64(bar.low);
    let prev_close = dec_f64(prev.close);
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}

/// Wilder-smoothed ATR series: seeded with the simple mean of the first
/// `period` true ranges, then each bar folds in at weight 1/period.
/// One value per bar from index `period` on; empty below `period + 1` bars.
fn wilder_atr_series(bars: &[Candle], period: usize) -> Vec<f64> {
    if bars.len() < period + 1 {
        return Vec::new();
    }

    let true_ranges: Vec<f64> = bars.windows(2).map(|w| true_range(&w[1], &w[0])).collect();

    let mut series = Vec::with_capacity(true_ranges.len() - period + 1);
    series.push(true_ranges[..period].iter().sum::<f64>() / period as f64);
    for tr in &true_ranges[period..] {
        let prev = series[series.len() - 1];
        series.push((prev * (period as f64 - 1.0) + tr) / period as f64);
    }

    series
}

/// Relative change of the latest value vs. `lookback` values earlier.
fn atr_relative_change(series: &[f64], lookback: usize) -> Option<f64> {
    if series.len() <= lookback {
        return None;
    }
    let current = series[series.len() - 1];
    let earlier = series[series.len() - 1 - lookback];
    (earlier != 0.0).then(|| (current - earlier) / earlier)
}

/// Z-score of the latest value against its trailing window.
fn trailing_zscore(series: &[f64], window: usize, min_len: usize) -> Option<f64> {
    if series.len() < min_len {
        return None;
    }
    let tail = &series[series.len().saturating_sub(window)..];
    let current = tail[tail.len() - 1];
    zscore_against(current, tail)
}

/// Z-score of `value` against a reference sample. Degenerate samples
/// (fewer than two points, zero spread) yield no score.
fn zscore_against(value: f64, sample: &[f64]) -> Option<f64> {
    if sample.len() < 2 {
        return None;
    }
    let mean = sample.iter().mean();
    let std_dev = sample.iter().std_dev();
    (std_dev > 0.0).then(|| (value - mean) / std_dev)
}

/// Sample standard deviation of log close-to-close returns.
fn realized_vol(bars: &[Candle]) -> Option<f64> {
    if bars.len() < 3 {
        return None;
    }

    let mut returns = Vec::with_capacity(bars.len() - 1);
    for pair in bars.windows(2) {
        let prev = dec_f64(pair[0].close);
        let curr = dec_f64(pair[1].close);
        if prev > 0.0 && curr > 0.0 {
            returns.push((curr / prev).ln());
        }
    }

    if returns.len() < 2 {
        return None;
    }
    Some(returns.iter().std_dev())
}

/// Mean interval overlap/union of consecutive bars. Two degenerate bars
/// at the same price coincide entirely and count as full overlap.
fn mean_overlap_ratio(bars: &[Candle]) -> Option<f64> {
    if bars.len() < 2 {
        return None;
    }

    let mut ratios = Vec::with_capacity(bars.len() - 1);
    for pair in bars.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        let overlap = dec_f64(prev.high.min(curr.high)) - dec_f64(prev.low.max(curr.low));
        let union = dec_f64(prev.high.max(curr.high)) - dec_f64(prev.low.min(curr.low));
        if union > 0.0 {
            ratios.push(overlap.max(0.0) / union);
        } else {
            ratios.push(1.0);
        }
    }

    Some(ratios.iter().mean())
}

/// Net close-to-close move over total absolute movement, sign preserved.
fn directional_efficiency(bars: &[Candle]) -> Option<f64> {
    let closes: Vec<f64> = bars.iter().map(|c| dec_f64(c.close)).collect();
    if closes.len() < 2 {
        return None;
    }

    let total: f64 = closes.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    if total == 0.0 {
        return None;
    }
    Some((closes[closes.len() - 1] - closes[0]) / total)
}

/// Mean pullback depth over the efficiency window.
///
/// Swing points are closes that clear both neighbors by at least
/// 0.1 x ATR. Legs between swing points split into with-trend travel and
/// counter-trend pullbacks; each pullback's depth is its size as a
/// fraction of total with-trend travel. A one-way move scores 0.
fn avg_pullback_depth(bars: &[Candle], atr: f64) -> Option<f64> {
    let closes: Vec<f64> = bars.iter().map(|c| dec_f64(c.close)).collect();
    if closes.len() < 3 {
        return None;
    }

    let net = closes[closes.len() - 1] - closes[0];
    if net == 0.0 {
        return None;
    }
    let direction = net.signum();
    let threshold = PULLBACK_ATR_FACTOR * atr;

    let mut swings = vec![closes[0]];
    for i in 1..closes.len() - 1 {
        let close = closes[i];
        let swing_high = close >= closes[i - 1] + threshold && close >= closes[i + 1] + threshold;
        let swing_low = close <= closes[i - 1] - threshold && close <= closes[i + 1] - threshold;
        if swing_high || swing_low {
            swings.push(close);
        }
    }
    swings.push(closes[closes.len() - 1]);

    let mut travel = 0.0;
    let mut pullbacks = Vec::new();
    for pair in swings.windows(2) {
        let leg = pair[1] - pair[0];
        if leg.signum() == direction {
            travel += leg.abs();
        } else if leg != 0.0 {
            pullbacks.push(leg.abs());
        }
    }

    if travel == 0.0 {
        return None;
    }
    if pullbacks.is_empty() {
        return Some(0.0);
    }
    Some(pullbacks.iter().map(|p| p / travel).sum::<f64>() / pullbacks.len() as f64)
}

/// High-to-low range across a bar set.
fn range_of(bars: &[&Candle]) -> Option<f64> {
    if bars.is_empty() {
        return None;
    }
    let high = bars
        .iter()
        .map(|c| dec_f64(c.high))
        .fold(f64::MIN, f64::max);
    let low = bars.iter().map(|c| dec_f64(c.low)).fold(f64::MAX, f64::min);
    Some(high - low)
}

/// Regular-session ranges of prior Chicago trading dates, oldest first.
fn prior_session_ranges(bars: &[Candle], today: NaiveDate) -> Vec<f64> {
    let mut by_day: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();

    for bar in bars {
        if !session::is_regular_session(bar.timestamp) {
            continue;
        }
        let date = session::session_date(bar.timestamp);
        if date == today {
            continue;
        }
        let entry = by_day.entry(date).or_insert((f64::MIN, f64::MAX));
        entry.0 = entry.0.max(dec_f64(bar.high));
        entry.1 = entry.1.min(dec_f64(bar.low));
    }

    by_day.values().map(|(high, low)| high - low).collect()
}

/// High/low of the opening-range bars (08:30 - 09:00 CT).
fn opening_range(session_bars: &[&Candle]) -> Option<(f64, f64)> {
    let or_bars: Vec<&&Candle> = session_bars
        .iter()
        .filter(|c| session::session_phase(c.timestamp) == SessionPhase::OpeningRange)
        .collect();
    if or_bars.is_empty() {
        return None;
    }

    let high = or_bars
        .iter()
        .map(|c| dec_f64(c.high))
        .fold(f64::MIN, f64::max);
    let low = or_bars
        .iter()
        .map(|c| dec_f64(c.low))
        .fold(f64::MAX, f64::min);
    Some((high, low))
}

/// Last-`window` volume over the prior `window`, minus 1.
fn volume_acceleration(bars: &[Candle], window: usize) -> Option<f64> {
    if bars.len() < 2 * window {
        return None;
    }
    let recent: f64 = bars[bars.len() - window..]
        .iter()
        .map(|c| c.volume as f64)
        .sum();
    let earlier: f64 = bars[bars.len() - 2 * window..bars.len() - window]
        .iter()
        .map(|c| c.volume as f64)
        .sum();
    (earlier > 0.0).then(|| recent / earlier - 1.0)
}

/// Mean (high - low) / volume, zero-volume bars excluded.
fn range_per_volume(bars: &[Candle]) -> Option<f64> {
    let ratios: Vec<f64> = bars
        .iter()
        .filter(|c| c.volume > 0)
        .map(|c| (dec_f64(c.high) - dec_f64(c.low)) / c.volume as f64)
        .collect();
    if ratios.is_empty() {
        return None;
    }
    Some(ratios.iter().mean())
}
