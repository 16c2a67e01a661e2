//! Market regime classification module.
//!
//! Categorizes intraday market state into four canonical regimes:
//! - Balanced / Rotational: two-sided rotation around accepted value
//! - Trend / Initiative: one-sided initiative flow
//! - Transition / Breakout Attempt: contested, unresolved structure
//! - Event-Distorted: scheduled-event override

pub mod classifier;

pub use classifier::RegimeClassifier;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contracts::Instrument;
use crate::session::SessionPhase;

/// Primary market regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimaryRegime {
    #[serde(rename = "Balanced / Rotational")]
    Balanced,
    #[serde(rename = "Trend / Initiative")]
    Trend,
    #[serde(rename = "Transition / Breakout Attempt")]
    Transition,
    #[serde(rename = "Event-Distorted")]
    EventDistorted,
}

impl PrimaryRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Balanced => "Balanced / Rotational",
            Self::Trend => "Trend / Initiative",
            Self::Transition => "Transition / Breakout Attempt",
            Self::EventDistorted => "Event-Distorted",
        }
    }
}

impl std::fmt::Display for PrimaryRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Regime subtype. Tight/normal/migrating qualify a balance;
/// clean/grinding/liquidation qualify a trend. Transitions carry none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecondaryTag {
    Tight,
    Normal,
    Migrating,
    Clean,
    Grinding,
    Liquidation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityState {
    Compressing,
    Normal,
    Expanding,
    Extreme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipationState {
    Thin,
    Normal,
    Heavy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceState {
    Balanced,
    Transitioning,
    Imbalanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendQuality {
    None,
    Weak,
    Clean,
    Extreme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseLevel {
    Low,
    Medium,
    High,
}

/// Final classification record.
///
/// Field names are the serialized report contract; every enum value
/// round-trips through JSON unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeReport {
    pub instrument: Instrument,
    pub timestamp: DateTime<Utc>,
    pub primary_regime: PrimaryRegime,
    pub secondary_tag: Option<SecondaryTag>,
    pub confidence: u8,
    pub volatility_state: VolatilityState,
    pub participation_state: ParticipationState,
    pub balance_state: BalanceState,
    pub trend_quality: TrendQuality,
    pub noise_level: NoiseLevel,
    pub session_phase: SessionPhase,
    pub order_flow_reliability_note: String,
}

impl RegimeReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Fixed order-flow reliability guidance per (primary, secondary) pair.
pub fn reliability_note(primary: PrimaryRegime, tag: Option<SecondaryTag>) -> &'static str {
    match (primary, tag) {
        (PrimaryRegime::Balanced, Some(SecondaryTag::Tight)) => {
            "Range extremes well defined; responsive trade reliable until the range breaks."
        }
        (PrimaryRegime::Balanced, Some(SecondaryTag::Migrating)) => {
            "Rotational reads degrade while value migrates; favor the migration side."
        }
        (PrimaryRegime::Balanced, _) => "Reliable only at range extremes; unreliable mid-range.",
        (PrimaryRegime::Trend, Some(SecondaryTag::Liquidation)) => {
            "One-sided flow dominates; countertrend signals unreliable."
        }
        (PrimaryRegime::Trend, Some(SecondaryTag::Grinding)) => {
            "Continuation favored but entries suffer; pullbacks run deep."
        }
        (PrimaryRegime::Trend, _) => "Continuation signals favored; fading less reliable.",
        (PrimaryRegime::Transition, _) => "Signals unreliable until acceptance or failure.",
        (PrimaryRegime::EventDistorted, _) => {
            "All microstructure warped; interpretation degraded."
        }
    }
}
