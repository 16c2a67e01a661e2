//! Core candle types and series validation.
//!
//! Prices stay `Decimal` at the data boundary; the statistics layer
//! converts to `f64` once per computation. A `CandleSeries` can only be
//! built through validation, so every downstream consumer may assume
//! well-formed, strictly ordered bars.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Bar frequency of a candle series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinute,
}

impl Frequency {
    pub fn minutes(&self) -> i64 {
        match self {
            Self::OneMinute => 1,
            Self::FiveMinute => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinute => "5m",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single OHLCV bar. `timestamp` is the bar open in UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

impl Candle {
    /// Typical price (high + low + close) / 3, at the statistics boundary.
    pub fn typical_price(&self) -> f64 {
        (dec_f64(self.high) + dec_f64(self.low) + dec_f64(self.close)) / 3.0
    }

    fn validate(&self) -> Result<(), String> {
        if self.low > self.high {
            return Err(format!("low {} above high {}", self.low, self.high));
        }
        if self.low > self.open.min(self.close) {
            return Err(format!("low {} above open/close", self.low));
        }
        if self.high < self.open.max(self.close) {
            return Err(format!("high {} below open/close", self.high));
        }
        Ok(())
    }
}

/// Convert a price to `f64` at the statistics boundary.
pub(crate) fn dec_f64(value: Decimal) -> f64 {
    value.try_into().unwrap_or(0.0)
}

/// An ordered, validated candle series at a fixed frequency.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    frequency: Frequency,
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Validate and wrap a candle vector.
    ///
    /// Timestamps must be strictly increasing, and each gap must be a
    /// positive multiple of the frequency: maintenance halts and
    /// overnight gaps are legal, reordered or off-grid bars are not.
    pub fn new(frequency: Frequency, candles: Vec<Candle>) -> EngineResult<Self> {
        for candle in &candles {
            candle
                .validate()
                .map_err(|reason| EngineError::InvalidCandle {
                    timestamp: candle.timestamp,
                    reason,
                })?;
        }

        let step = Duration::minutes(frequency.minutes());
        for pair in candles.windows(2) {
            let gap = pair[1].timestamp - pair[0].timestamp;
            if gap < step {
                return Err(EngineError::InvalidCandle {
                    timestamp: pair[1].timestamp,
                    reason: format!("timestamp not increasing by at least one {} bar", frequency),
                });
            }
            if gap.num_seconds() % step.num_seconds() != 0 {
                return Err(EngineError::InvalidCandle {
                    timestamp: pair[1].timestamp,
                    reason: format!("timestamp off the {} grid", frequency),
                });
            }
        }

        Ok(Self { frequency, candles })
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }
}
