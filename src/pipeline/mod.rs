//! Classification pipeline.
//!
//! Wires a candle source through contract resolution, feature
//! calculation and regime classification. One classification is a single
//! pure pass over immutable inputs; runs for different instruments share
//! nothing and can fan out in parallel.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::calibration::Calibration;
use crate::contracts::{front_month_symbol, Instrument};
use crate::data::{CandleSource, Clock, EventWindow, Frequency, DEFAULT_LOOKBACK_DAYS};
use crate::error::{EngineError, EngineResult};
use crate::features::FeatureCalculator;
use crate::regime::{RegimeClassifier, RegimeReport};
use crate::session::SessionContext;

/// End-to-end regime pipeline over injected collaborators.
pub struct RegimePipeline<S, C, E> {
    source: S,
    clock: C,
    events: E,
    lookback_days: u32,
}

impl<S, C, E> RegimePipeline<S, C, E>
where
    S: CandleSource + Sync,
    C: Clock + Sync,
    E: EventWindow + Sync,
{
    pub fn new(source: S, clock: C, events: E) -> Self {
        Self {
            source,
            clock,
            events,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    /// Run one end-to-end classification for an instrument.
    pub fn classify(&self, instrument: Instrument) -> EngineResult<RegimeReport> {
        let now = self.clock.now();
        let symbol = front_month_symbol(instrument, now);
        info!(%instrument, %symbol, "classifying regime");

        let candles_1m = self
            .source
            .fetch(&symbol, Frequency::OneMinute, self.lookback_days)
            .map_err(EngineError::Source)?;
        let candles_5m = self
            .source
            .fetch(&symbol, Frequency::FiveMinute, self.lookback_days)
            .map_err(EngineError::Source)?;
        debug!(
            bars_1m = candles_1m.len(),
            bars_5m = candles_5m.len(),
            "history fetched"
        );

        let session = SessionContext::at(now);
        let calibration = Calibration::for_instrument(instrument);
        let features =
            FeatureCalculator::new(calibration).compute(&candles_1m, &candles_5m, &session)?;
        let event_active = self.events.is_event_active(now);

        let report =
            RegimeClassifier::new(calibration).classify(&features, &session, event_active, now);
        info!(
            %instrument,
            primary = %report.primary_regime,
            confidence = report.confidence,
            "regime classified"
        );
        Ok(report)
    }

    /// Classify several instruments in parallel. Each run is independent
    /// and carries its own timestamp; no ordering holds between them.
    pub fn classify_all(&self, instruments: &[Instrument]) -> Vec<EngineResult<RegimeReport>> {
        instruments
            .par_iter()
            .map(|instrument| self.classify(*instrument))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal::Decimal;

    use crate::contracts::Symbol;
    use crate::data::{Candle, CandleSeries};
    use crate::regime::{
        BalanceState, NoiseLevel, ParticipationState, PrimaryRegime, SecondaryTag, TrendQuality,
        VolatilityState,
    };
    use crate::session::SessionPhase;

    struct StaticSource {
        one_minute: Vec<Candle>,
        five_minute: Vec<Candle>,
    }

    impl CandleSource for StaticSource {
        fn fetch(
            &self,
            _symbol: &Symbol,
            frequency: Frequency,
            _lookback_days: u32,
        ) -> Result<CandleSeries> {
            let candles = match frequency {
                Frequency::OneMinute => self.one_minute.clone(),
                Frequency::FiveMinute => self.five_minute.clone(),
            };
            Ok(CandleSeries::new(frequency, candles)?)
        }
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct EventFlag(bool);

    impl EventWindow for EventFlag {
        fn is_event_active(&self, _now: DateTime<Utc>) -> bool {
            self.0
        }
    }

    fn pipeline(
        one_minute: Vec<Candle>,
        five_minute: Vec<Candle>,
        as_of: DateTime<Utc>,
        event: bool,
    ) -> RegimePipeline<StaticSource, FixedClock, EventFlag> {
        RegimePipeline::new(
            StaticSource {
                one_minute,
                five_minute,
            },
            FixedClock(as_of),
            EventFlag(event),
        )
    }

    fn dec(value: f64) -> Decimal {
        Decimal::from_f64(value).unwrap()
    }

    fn mk(ts: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Candle {
        Candle {
            timestamp: ts,
            open: dec(open),
            high: dec(high),
            low: dec(low),
            close: dec(close),
            volume,
        }
    }

    /// June 2025 is CDT, so a CT wall-clock minute is UTC + 5 hours.
    fn ct_min(day: u32, minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, 0, 0, 0).unwrap() + Duration::minutes(minutes + 300)
    }

    fn ct(day: u32, hour: i64, minute: i64) -> DateTime<Utc> {
        ct_min(day, hour * 60 + minute)
    }

    /// Regular-session rotational 5-minute bars from 08:30 CT: closes
    /// oscillate around `base`, highs and lows hold a band of width
    /// 2 x `pad` with mild jitter so consecutive bars overlap heavily.
    fn rotational_5m(
        day: u32,
        count: usize,
        base: f64,
        close_amp: f64,
        pad: f64,
        volume: u64,
        out: &mut Vec<Candle>,
    ) {
        let mut prev_close = base;
        for i in 0..count {
            let x = i as f64;
            let close = base + close_amp * (x * 2.1).sin();
            let low = base - pad + 0.5 * (x * 1.3).sin();
            let high = base + pad + 0.5 * (x * 1.7).cos();
            out.push(mk(
                ct_min(day, 510 + 5 * i as i64),
                prev_close,
                high,
                low,
                close,
                volume,
            ));
            prev_close = close;
        }
    }

    /// Prior trading days used by the ES scenarios: five rotational
    /// sessions around 5800 with slightly different daily ranges.
    fn es_history_5m(out: &mut Vec<Candle>) {
        for (day, pad) in [(3u32, 2.5), (4, 2.6), (5, 2.7), (6, 2.4), (9, 2.5)] {
            rotational_5m(day, 90, 5800.0, 1.5, pad, 21_000, out);
        }
    }

    /// S1: balanced ES lunch. Oscillating 1-minute closes around 5800,
    /// heavily overlapping 5-minute bars, calm recent volatility.
    fn s1_fixture() -> (Vec<Candle>, Vec<Candle>) {
        let mut five = Vec::new();
        es_history_5m(&mut five);
        // Today up to 12:25 CT, closes quieter than the prior days.
        rotational_5m(10, 48, 5800.0, 0.5, 2.5, 21_000, &mut five);

        let mut one = Vec::new();
        let mut prev_close = 5800.0;
        for j in 0..60i64 {
            let x = j as f64;
            let close = 5800.0 + 2.0 * (x * 0.9).sin();
            one.push(mk(
                ct_min(10, 690 + j),
                prev_close,
                prev_close.max(close) + 0.3,
                prev_close.min(close) - 0.3,
                close,
                15_000,
            ));
            prev_close = close;
        }
        (one, five)
    }

    /// S2: clean NQ trend mid-morning. A volatile early week, a Monday
    /// that chops hard bar to bar inside a narrow band, then a steady
    /// one-way drive with ranges widening as the move accelerates.
    fn s2_fixture() -> (Vec<Candle>, Vec<Candle>) {
        let mut five = Vec::new();
        for (day, close_amp, pad) in [
            (3u32, 9.0, 12.0),
            (4, 6.0, 8.0),
            (5, 10.0, 16.0),
            (6, 9.0, 14.0),
        ] {
            rotational_5m(day, 90, 20_000.0, close_amp, pad, 95_000, &mut five);
        }
        // Monday: every bar reverses the last, 12 points at a clip.
        let mut prev_close = 20_000.0 + 9.0 * (89.0 * 2.1_f64).sin();
        for i in 0..90i64 {
            let close = if i % 2 == 0 { 20_006.0 } else { 19_994.0 };
            five.push(mk(
                ct_min(9, 510 + 5 * i),
                prev_close,
                prev_close.max(close) + 1.0,
                prev_close.min(close) - 1.0,
                close,
                95_000,
            ));
            prev_close = close;
        }
        // Today: 24 bars from 08:30 to 10:25 driving higher.
        for x in 1..=24i64 {
            let xf = x as f64;
            let wobble = if x % 2 == 0 { 8.0 } else { -8.0 };
            let close = 20_000.0 + 15.0 * xf + wobble;
            let pad = 1.0 + 0.35 * xf;
            five.push(mk(
                ct_min(10, 510 + 5 * (x - 1)),
                prev_close,
                prev_close.max(close) + pad,
                prev_close.min(close) - pad,
                close,
                110_000,
            ));
            prev_close = close;
        }

        let mut one = Vec::new();
        let mut prev_close = 20_160.0;
        for j in 0..60i64 {
            let x = j as f64;
            let close = 20_160.0 + 3.0 * x + 1.2 * (x * 1.3).sin();
            one.push(mk(
                ct_min(10, 570 + j),
                prev_close,
                prev_close.max(close) + 0.3,
                prev_close.min(close) - 0.3,
                close,
                11_000,
            ));
            prev_close = close;
        }
        (one, five)
    }

    /// S3: ES opening range with a sudden expansion in the last bars.
    fn s3_fixture() -> (Vec<Candle>, Vec<Candle>) {
        let mut five = Vec::new();
        es_history_5m(&mut five);
        five.push(mk(ct_min(10, 510), 5800.0, 5802.5, 5797.5, 5799.0, 25_000));
        five.push(mk(ct_min(10, 515), 5799.0, 5802.0, 5797.0, 5801.0, 25_000));
        five.push(mk(ct_min(10, 520), 5801.0, 5815.0, 5795.0, 5812.0, 40_000));
        five.push(mk(ct_min(10, 525), 5812.0, 5825.0, 5800.0, 5820.0, 45_000));

        let mut one = Vec::new();
        let mut prev_close = 5800.0;
        // 07:50 - 08:39 CT: two-sided chop.
        for j in 0..50i64 {
            let x = j as f64;
            let close = 5800.0 + 2.0 * (x * 0.9).sin();
            one.push(mk(
                ct_min(10, 470 + j),
                prev_close,
                prev_close.max(close) + 0.3,
                prev_close.min(close) - 0.3,
                close,
                6_000,
            ));
            prev_close = close;
        }
        // 08:40 - 08:49 CT: the range blows out both ways.
        for (j, close) in [
            5806.0, 5797.0, 5812.0, 5803.0, 5818.0, 5807.0, 5821.0, 5811.0, 5825.0, 5820.0,
        ]
        .into_iter()
        .enumerate()
        {
            one.push(mk(
                ct_min(10, 520 + j as i64),
                prev_close,
                prev_close.max(close) + 3.0,
                prev_close.min(close) - 3.0,
                close,
                6_500,
            ));
            prev_close = close;
        }
        (one, five)
    }

    /// S6: ES liquidation. A calm week, then a one-way collapse with
    /// exploding ranges through the early afternoon.
    fn s6_fixture() -> (Vec<Candle>, Vec<Candle>) {
        let mut five = Vec::new();
        es_history_5m(&mut five);
        // Today is quiet until 13:00 CT.
        rotational_5m(10, 54, 5800.0, 1.5, 2.5, 21_000, &mut five);
        // 13:00 - 13:55 CT: forced selling, ranges triple.
        let mut prev_close = 5800.0 + 1.5 * (53.0 * 2.1_f64).sin();
        for k in 0..12i64 {
            let x = (k + 1) as f64;
            let close = 5800.0 - 28.0 * x - 4.0 * (x * 1.1).sin();
            five.push(mk(
                ct_min(10, 780 + 5 * k),
                prev_close,
                prev_close.max(close) + 2.0,
                prev_close.min(close) - 8.0,
                close,
                60_000,
            ));
            prev_close = close;
        }

        let mut one = Vec::new();
        let mut prev_close = 5800.0;
        for j in 0..60i64 {
            let x = j as f64;
            let close = 5800.0 - 4.7 * x - 1.5 * (x * 1.1).sin();
            one.push(mk(
                ct_min(10, 780 + j),
                prev_close,
                prev_close.max(close) + 0.5,
                prev_close.min(close) - 0.5,
                close,
                18_000,
            ));
            prev_close = close;
        }
        (one, five)
    }

    #[test]
    fn test_s1_balanced_es_lunch() {
        let (one, five) = s1_fixture();
        let report = pipeline(one, five, ct(10, 12, 30), false)
            .classify(Instrument::Es)
            .unwrap();

        assert_eq!(report.primary_regime, PrimaryRegime::Balanced);
        assert_eq!(report.secondary_tag, Some(SecondaryTag::Normal));
        assert_eq!(report.volatility_state, VolatilityState::Normal);
        assert_eq!(report.balance_state, BalanceState::Balanced);
        assert_eq!(report.trend_quality, TrendQuality::None);
        assert_eq!(report.session_phase, SessionPhase::Lunch);
        assert_eq!(report.participation_state, ParticipationState::Normal);
        assert!(report.confidence >= 65, "confidence {}", report.confidence);
    }

    #[test]
    fn test_s2_clean_trend_nq_mid_morning() {
        let (one, five) = s2_fixture();
        let report = pipeline(one, five, ct(10, 10, 30), false)
            .classify(Instrument::Nq)
            .unwrap();

        assert_eq!(report.primary_regime, PrimaryRegime::Trend);
        assert_eq!(report.secondary_tag, Some(SecondaryTag::Clean));
        assert_eq!(report.balance_state, BalanceState::Imbalanced);
        assert_eq!(report.trend_quality, TrendQuality::Clean);
        assert_eq!(report.session_phase, SessionPhase::MidMorning);
        assert!(report.confidence >= 75, "confidence {}", report.confidence);
    }

    #[test]
    fn test_s3_transition_es_opening_range() {
        let (one, five) = s3_fixture();
        let report = pipeline(one, five, ct(10, 8, 50), false)
            .classify(Instrument::Es)
            .unwrap();

        assert_eq!(report.primary_regime, PrimaryRegime::Transition);
        assert_eq!(report.secondary_tag, None);
        assert_eq!(report.noise_level, NoiseLevel::High);
        assert_eq!(report.session_phase, SessionPhase::OpeningRange);
        assert!(report.confidence <= 65, "confidence {}", report.confidence);
    }

    #[test]
    fn test_s4_event_distorted_nq() {
        let (one, five) = s2_fixture();
        let report = pipeline(one, five, ct(10, 10, 30), true)
            .classify(Instrument::Nq)
            .unwrap();

        assert_eq!(report.primary_regime, PrimaryRegime::EventDistorted);
        assert_eq!(report.secondary_tag, None);
        assert!(report.confidence >= 30 && report.confidence <= 60);
        assert_eq!(report.balance_state, BalanceState::Transitioning);
        // Descriptive state still computed from the features.
        assert_eq!(report.volatility_state, VolatilityState::Normal);
        assert_eq!(report.participation_state, ParticipationState::Normal);
        assert_eq!(
            report.order_flow_reliability_note,
            "All microstructure warped; interpretation degraded."
        );
    }

    #[test]
    fn test_s5_insufficient_data() {
        let (mut one, five) = s1_fixture();
        one.truncate(30);
        let err = pipeline(one, five, ct(10, 12, 30), false)
            .classify(Instrument::Es)
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::InsufficientData {
                frequency: Frequency::OneMinute,
                observed: 30,
                required: 60,
            }
        ));
    }

    #[test]
    fn test_s6_liquidation_es() {
        let (one, five) = s6_fixture();
        let report = pipeline(one, five, ct(10, 14, 0), false)
            .classify(Instrument::Es)
            .unwrap();

        assert_eq!(report.primary_regime, PrimaryRegime::Trend);
        assert_eq!(report.secondary_tag, Some(SecondaryTag::Liquidation));
        assert_eq!(report.trend_quality, TrendQuality::Extreme);
        assert!(matches!(
            report.volatility_state,
            VolatilityState::Expanding | VolatilityState::Extreme
        ));
        assert_eq!(report.balance_state, BalanceState::Imbalanced);
    }

    #[test]
    fn test_boundary_bar_counts() {
        // Exactly 60 one-minute and 20 five-minute bars classify.
        let mut one = Vec::new();
        let mut five = Vec::new();
        for j in 0..60i64 {
            one.push(mk(ct_min(10, 690 + j), 5800.0, 5801.0, 5799.0, 5800.0, 1_000));
        }
        for i in 0..20i64 {
            five.push(mk(
                ct_min(10, 650 + 5 * i),
                5800.0,
                5801.0,
                5799.0,
                5800.0,
                5_000,
            ));
        }

        let ok = pipeline(one.clone(), five.clone(), ct(10, 12, 30), false)
            .classify(Instrument::Es);
        assert!(ok.is_ok());

        let mut short_one = one.clone();
        short_one.pop();
        let err = pipeline(short_one, five.clone(), ct(10, 12, 30), false)
            .classify(Instrument::Es)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientData {
                frequency: Frequency::OneMinute,
                observed: 59,
                ..
            }
        ));

        let mut short_five = five;
        short_five.pop();
        let err = pipeline(one, short_five, ct(10, 12, 30), false)
            .classify(Instrument::Es)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientData {
                frequency: Frequency::FiveMinute,
                observed: 19,
                ..
            }
        ));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let (one, five) = s2_fixture();
        let pipe = pipeline(one, five, ct(10, 10, 30), false);
        let first = pipe.classify(Instrument::Nq).unwrap();
        let second = pipe.classify(Instrument::Nq).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.to_json().unwrap(),
            second.to_json().unwrap()
        );
    }

    #[test]
    fn test_classify_all_runs_both_instruments() {
        let (one, five) = s1_fixture();
        let pipe = pipeline(one, five, ct(10, 12, 30), false);
        let reports = pipe.classify_all(&Instrument::ALL);
        assert_eq!(reports.len(), 2);
        for report in &reports {
            assert!(report.is_ok());
        }
        assert_eq!(
            reports[0].as_ref().unwrap().instrument,
            Instrument::Es
        );
        assert_eq!(
            reports[1].as_ref().unwrap().instrument,
            Instrument::Nq
        );
    }

    #[test]
    fn test_permuted_candles_surface_invalid_candle() {
        let (mut one, five) = s1_fixture();
        one.swap(10, 40);
        let err = pipeline(one, five, ct(10, 12, 30), false)
            .classify(Instrument::Es)
            .unwrap_err();
        // The source wraps series validation, so the root cause is the
        // candle ordering violation rather than a silently different read.
        assert!(err.to_string().contains("candle source error"));
        assert!(matches!(err, EngineError::Source(_)));
    }
}
