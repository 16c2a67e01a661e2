//! Candle file loader.
//!
//! Loads candle history from JSON files into the validated series type.
//! Files are arrays of OHLCV records named `<ROOT>_<freq>.json`, e.g.
//! `ES_1m.json` and `ES_5m.json` under the data directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use super::{Candle, CandleSeries, CandleSource, Frequency};
use crate::contracts::Symbol;

/// JSON-file candle source for fixtures and offline runs.
pub struct FileCandleSource {
    data_dir: PathBuf,
}

impl FileCandleSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn candle_path(&self, symbol: &Symbol, frequency: Frequency) -> PathBuf {
        self.data_dir
            .join(format!("{}_{}.json", symbol.root(), frequency))
    }
}

impl CandleSource for FileCandleSource {
    fn fetch(
        &self,
        symbol: &Symbol,
        frequency: Frequency,
        _lookback_days: u32,
    ) -> Result<CandleSeries> {
        let path = self.candle_path(symbol, frequency);
        let series = load_candle_file(&path, frequency)?;
        debug!(%symbol, %frequency, bars = series.len(), "loaded candle file");
        Ok(series)
    }
}

/// Load and validate one candle file.
pub fn load_candle_file(path: &Path, frequency: Frequency) -> Result<CandleSeries> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading candle file {}", path.display()))?;
    let candles: Vec<Candle> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing candle file {}", path.display()))?;
    Ok(CandleSeries::new(frequency, candles)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_candle_json_round_trip() {
        let json = r#"[
            {
                "timestamp": "2025-06-10T14:30:00Z",
                "open": "5800.25",
                "high": "5803.50",
                "low": "5799.00",
                "close": "5802.75",
                "volume": 12000
            }
        ]"#;

        let candles: Vec<Candle> = serde_json::from_str(json).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(
            candles[0].timestamp,
            Utc.with_ymd_and_hms(2025, 6, 10, 14, 30, 0).unwrap()
        );
        assert_eq!(candles[0].volume, 12000);

        let back = serde_json::to_string(&candles).unwrap();
        let again: Vec<Candle> = serde_json::from_str(&back).unwrap();
        assert_eq!(again, candles);
    }

    #[test]
    fn test_missing_file_is_contextual_error() {
        let err = load_candle_file(Path::new("/nonexistent/ES_1m.json"), Frequency::OneMinute)
            .unwrap_err();
        assert!(err.to_string().contains("ES_1m.json"));
    }
}
