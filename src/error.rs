//! Engine error taxonomy.
//!
//! The calculator and classifier can only fail in the three ways below:
//! an unknown instrument root, too little history, or a candle that
//! violates its shape/ordering invariants. Transport, authentication and
//! persistence failures belong to collaborators and pass through the
//! `Source` wrapper without ever originating inside the engine.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::data::Frequency;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Unknown instrument root. Only ES and NQ trade through this engine.
    #[error("unknown instrument root: {0}")]
    InvalidInstrument(String),

    /// Fewer candles than the classification minimum.
    #[error("insufficient {frequency} candles: {observed} observed, {required} required")]
    InsufficientData {
        frequency: Frequency,
        observed: usize,
        required: usize,
    },

    /// A candle violated its invariants. The engine never repairs data.
    #[error("invalid candle at {timestamp}: {reason}")]
    InvalidCandle {
        timestamp: DateTime<Utc>,
        reason: String,
    },

    /// Failure inside an external candle source.
    #[error("candle source error: {0}")]
    Source(anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
