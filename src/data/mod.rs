//! Candle data layer.
//!
//! This module handles:
//! - Core candle types and series validation (Candle, CandleSeries)
//! - Collaborator seams (CandleSource, Clock, EventWindow)
//! - JSON candle file loading for fixtures and offline runs

pub mod candle;
pub mod loader;
pub mod source;

pub use candle::{Candle, CandleSeries, Frequency};
pub use loader::{load_candle_file, FileCandleSource};
pub use source::{
    CandleSource, Clock, EventWindow, NoEvents, SystemClock, DEFAULT_LOOKBACK_DAYS,
};

pub(crate) use candle::dec_f64;
