pub mod calibration;
pub mod contracts;
pub mod data;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod regime;
pub mod session;

// Re-export commonly used types
pub use calibration::{Calibration, ES_CAL, NQ_CAL};
pub use contracts::{front_month_symbol, Instrument, Symbol};
pub use data::{
    Candle, CandleSeries, CandleSource, Clock, EventWindow, Frequency, NoEvents, SystemClock,
};
pub use error::{EngineError, EngineResult};
pub use features::{FeatureCalculator, Features};
pub use pipeline::RegimePipeline;
pub use regime::{PrimaryRegime, RegimeClassifier, RegimeReport};
pub use session::{SessionContext, SessionPhase};
