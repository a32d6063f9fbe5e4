//! RSI engine: candle series, Wilder computation, and threshold alerts

pub mod candles;
pub mod engine;
pub mod wilder;

pub use candles::{Candle, CandleSource, TrackerCandleClient};
pub use engine::{closed_candle_rsi, evaluate_transitions, run_rsi_engine, RsiTaskConfig};
pub use wilder::{latest_rsi, DEFAULT_PERIOD};
