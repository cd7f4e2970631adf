// Technical indicators module
// Implements price change, EMA, RSI and ATR over 1-minute candles

pub mod atr;
pub mod change;
pub mod moving_average;
pub mod rsi;
pub mod snapshot;

pub use atr::{calculate_atr, calculate_atr_pct};
pub use change::pct_change;
pub use moving_average::{calculate_ema, calculate_sma};
pub use rsi::calculate_rsi;
pub use snapshot::{compute, IndicatorSnapshot, MIN_SAMPLES};
