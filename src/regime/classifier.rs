//! Regime classification logic.
//!
//! Turns the feature vector into a regime report through integer balance
//! and imbalance scoring: each side collects one point per satisfied
//! criterion, and a two-point margin decides the primary regime. State
//! fields and the confidence score derive from the same features, so the
//! whole mapping is deterministic for a given input.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::calibration::Calibration;
use crate::features::Features;
use crate::session::SessionContext;

use super::{
    reliability_note, BalanceState, NoiseLevel, ParticipationState, PrimaryRegime, RegimeReport,
    SecondaryTag, TrendQuality, VolatilityState,
};

/// |price_vs_vwap| at or below which price sits on value.
const BALANCE_VWAP_PROXIMITY: f64 = 0.002;
/// |efficiency| at or below which rotation dominates.
const BALANCE_EFFICIENCY_MAX: f64 = 0.30;
/// Bar overlap below which consecutive bars are separating.
const IMBALANCE_OVERLAP_MAX: f64 = 0.40;
/// Score margin required before either side wins outright.
const DECISION_MARGIN: i32 = 2;

/// Session-range z-score at or below which a balance is tight.
const TIGHT_RANGE_ZSCORE: f64 = -1.0;
/// Fraction of the strong-slope threshold at which a balance migrates.
const MIGRATING_SLOPE_FACTOR: f64 = 0.5;

/// Overlap above which structure reads as noisy chop.
const NOISE_OVERLAP_HIGH: f64 = 0.65;
/// |rv_ratio - 1| above which the volatility mix reads as noisy.
const NOISE_RV_DISLOCATION: f64 = 0.5;

const CONFIDENCE_BASE: i32 = 50;
const CONFIDENCE_PER_MARGIN: i32 = 10;
const CONFIDENCE_MARGIN_CAP: i32 = 30;
const CONFIDENCE_PER_MISSING: i32 = 10;
const CONFIDENCE_MISSING_CAP: i32 = 30;
const CONFIDENCE_TRANSITION_PENALTY: i32 = 15;
const CONFIDENCE_QUIET_BONUS: i32 = 5;
const EVENT_CONFIDENCE_MIN: i32 = 30;
const EVENT_CONFIDENCE_MAX: i32 = 60;

/// Classifies market regime from calculated features.
pub struct RegimeClassifier<'a> {
    calibration: &'a Calibration,
}

impl<'a> RegimeClassifier<'a> {
    pub fn new(calibration: &'a Calibration) -> Self {
        Self { calibration }
    }

    /// Classify features into a full regime report.
    ///
    /// An active event window overrides the primary regime and clamps
    /// confidence, but the descriptive state fields still compute so the
    /// report stays informative.
    pub fn classify(
        &self,
        features: &Features,
        session: &SessionContext,
        event_active: bool,
        timestamp: DateTime<Utc>,
    ) -> RegimeReport {
        let balance = self.balance_score(features);
        let imbalance = self.imbalance_score(features);
        debug!(
            instrument = %self.calibration.instrument,
            balance, imbalance, "regime scores"
        );

        let (mut primary, mut secondary) = self.primary_regime(balance, imbalance, features);
        let volatility_state = self.volatility_state(features);
        let participation_state = self.participation_state(features);
        let mut confidence = self.confidence(
            primary,
            balance,
            imbalance,
            features,
            volatility_state,
            participation_state,
        );

        if event_active {
            primary = PrimaryRegime::EventDistorted;
            secondary = None;
            confidence = confidence.clamp(EVENT_CONFIDENCE_MIN, EVENT_CONFIDENCE_MAX);
        }

        let balance_state = match primary {
            PrimaryRegime::Trend => BalanceState::Imbalanced,
            PrimaryRegime::Balanced => BalanceState::Balanced,
            _ => BalanceState::Transitioning,
        };
        let trend_quality = self.trend_quality(primary, features);
        let noise_level = self.noise_level(features);

        let report = RegimeReport {
            instrument: self.calibration.instrument,
            timestamp,
            primary_regime: primary,
            secondary_tag: secondary,
            confidence: confidence.clamp(0, 100) as u8,
            volatility_state,
            participation_state,
            balance_state,
            trend_quality,
            noise_level,
            session_phase: session.phase,
            order_flow_reliability_note: reliability_note(primary, secondary).to_string(),
        };

        debug!(
            primary = %report.primary_regime,
            confidence = report.confidence,
            "regime classified"
        );

        report
    }

    /// One point per balance criterion met. Missing features never score.
    fn balance_score(&self, features: &Features) -> i32 {
        let cal = self.calibration;
        let mut score = 0;
        if features
            .bar_overlap_ratio
            .map_or(false, |v| v >= cal.balance_overlap_threshold)
        {
            score += 1;
        }
        if features
            .price_vs_vwap
            .map_or(false, |v| v.abs() <= BALANCE_VWAP_PROXIMITY)
        {
            score += 1;
        }
        if features
            .directional_efficiency
            .map_or(false, |v| v.abs() <= BALANCE_EFFICIENCY_MAX)
        {
            score += 1;
        }
        if features.rv_ratio.map_or(false, |v| v < 1.0) {
            score += 1;
        }
        score
    }

    /// One point per imbalance criterion met.
    fn imbalance_score(&self, features: &Features) -> i32 {
        let cal = self.calibration;
        let mut score = 0;
        if features
            .directional_efficiency
            .map_or(false, |v| v.abs() >= cal.imbalance_efficiency_threshold)
        {
            score += 1;
        }
        if features
            .vwap_slope
            .map_or(false, |v| v.abs() >= cal.vwap_slope_strong)
        {
            score += 1;
        }
        if features
            .bar_overlap_ratio
            .map_or(false, |v| v < IMBALANCE_OVERLAP_MAX)
        {
            score += 1;
        }
        if features
            .atr_slope
            .map_or(false, |v| v >= cal.atr_expanding_slope)
        {
            score += 1;
        }
        score
    }

    fn primary_regime(
        &self,
        balance: i32,
        imbalance: i32,
        features: &Features,
    ) -> (PrimaryRegime, Option<SecondaryTag>) {
        if imbalance - balance >= DECISION_MARGIN {
            (PrimaryRegime::Trend, Some(self.trend_tag(features)))
        } else if balance - imbalance >= DECISION_MARGIN {
            (PrimaryRegime::Balanced, Some(self.balance_tag(features)))
        } else {
            (PrimaryRegime::Transition, None)
        }
    }

    fn balance_tag(&self, features: &Features) -> SecondaryTag {
        if features
            .session_range_zscore
            .map_or(false, |z| z <= TIGHT_RANGE_ZSCORE)
        {
            SecondaryTag::Tight
        } else if features.vwap_slope.map_or(false, |s| {
            s.abs() >= self.calibration.vwap_slope_strong * MIGRATING_SLOPE_FACTOR
        }) {
            SecondaryTag::Migrating
        } else {
            SecondaryTag::Normal
        }
    }

    fn trend_tag(&self, features: &Features) -> SecondaryTag {
        let (extreme_efficiency, extreme_zscore) = self.calibration.trend_quality_extreme;
        let efficiency = features.directional_efficiency.map(f64::abs);

        if efficiency.map_or(false, |e| e >= extreme_efficiency)
            && features.atr_zscore.map_or(false, |z| z >= extreme_zscore)
        {
            SecondaryTag::Liquidation
        } else if efficiency.map_or(false, |e| e >= self.calibration.trend_quality_clean) {
            SecondaryTag::Clean
        } else {
            SecondaryTag::Grinding
        }
    }

    fn volatility_state(&self, features: &Features) -> VolatilityState {
        let cal = self.calibration;
        if features
            .atr_zscore
            .map_or(false, |z| z >= cal.atr_extreme_zscore)
        {
            VolatilityState::Extreme
        } else if features
            .atr_slope
            .map_or(false, |s| s >= cal.atr_expanding_slope)
            && features
                .rv_ratio
                .map_or(false, |r| r >= cal.rv_ratio_expanding)
        {
            VolatilityState::Expanding
        } else if features
            .atr_slope
            .map_or(false, |s| s <= cal.atr_compressing_slope)
            && features.rv_ratio.map_or(false, |r| r < 1.0)
        {
            VolatilityState::Compressing
        } else {
            VolatilityState::Normal
        }
    }

    fn participation_state(&self, features: &Features) -> ParticipationState {
        let cal = self.calibration;
        match features.volume_vs_expected {
            Some(ratio) if ratio >= cal.participation_heavy => ParticipationState::Heavy,
            Some(ratio) if ratio <= cal.participation_thin => ParticipationState::Thin,
            _ => ParticipationState::Normal,
        }
    }

    fn trend_quality(&self, primary: PrimaryRegime, features: &Features) -> TrendQuality {
        let cal = self.calibration;
        let efficiency = features.directional_efficiency.map(f64::abs);

        match primary {
            PrimaryRegime::Balanced => TrendQuality::None,
            PrimaryRegime::Trend => {
                let (extreme_efficiency, extreme_zscore) = cal.trend_quality_extreme;
                if efficiency.map_or(false, |e| e >= extreme_efficiency)
                    && features.atr_zscore.map_or(false, |z| z >= extreme_zscore)
                {
                    TrendQuality::Extreme
                } else if efficiency.map_or(false, |e| e >= cal.trend_quality_clean) {
                    TrendQuality::Clean
                } else {
                    TrendQuality::Weak
                }
            }
            _ => {
                if efficiency.map_or(false, |e| e >= cal.trend_quality_weak) {
                    TrendQuality::Weak
                } else {
                    TrendQuality::None
                }
            }
        }
    }

    fn noise_level(&self, features: &Features) -> NoiseLevel {
        if features
            .bar_overlap_ratio
            .map_or(false, |o| o < IMBALANCE_OVERLAP_MAX)
            && features.atr_slope.map_or(false, |s| s > 0.0)
        {
            NoiseLevel::Low
        } else if features
            .bar_overlap_ratio
            .map_or(false, |o| o > NOISE_OVERLAP_HIGH)
            || features
                .rv_ratio
                .map_or(false, |r| (r - 1.0).abs() > NOISE_RV_DISLOCATION)
        {
            NoiseLevel::High
        } else {
            NoiseLevel::Medium
        }
    }

    /// Confidence starts at 50, earns 10 per winning-side point beyond
    /// the decision margin, loses 10 per missing scoring feature, loses
    /// 15 for an unresolved transition, and gains 5 when both volatility
    /// and participation sit at normal.
    fn confidence(
        &self,
        primary: PrimaryRegime,
        balance: i32,
        imbalance: i32,
        features: &Features,
        volatility: VolatilityState,
        participation: ParticipationState,
    ) -> i32 {
        let mut confidence = CONFIDENCE_BASE;

        let margin_excess = match primary {
            PrimaryRegime::Trend => imbalance - balance - DECISION_MARGIN,
            PrimaryRegime::Balanced => balance - imbalance - DECISION_MARGIN,
            _ => 0,
        };
        if margin_excess > 0 {
            confidence += (margin_excess * CONFIDENCE_PER_MARGIN).min(CONFIDENCE_MARGIN_CAP);
        }

        let missing = [
            features.bar_overlap_ratio,
            features.price_vs_vwap,
            features.directional_efficiency,
            features.rv_ratio,
            features.vwap_slope,
            features.atr_slope,
        ]
        .iter()
        .filter(|f| f.is_none())
        .count() as i32;
        confidence -= (missing * CONFIDENCE_PER_MISSING).min(CONFIDENCE_MISSING_CAP);

        if primary == PrimaryRegime::Transition {
            confidence -= CONFIDENCE_TRANSITION_PENALTY;
        }
        if volatility == VolatilityState::Normal && participation == ParticipationState::Normal {
            confidence += CONFIDENCE_QUIET_BONUS;
        }

        confidence.clamp(0, 100)
    }
}
