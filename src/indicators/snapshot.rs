use super::{calculate_atr_pct, calculate_ema, calculate_rsi, pct_change};
use crate::error::AssetError;
use crate::models::PriceSeries;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const EMA_SHORT_PERIOD: usize = 20;
pub const EMA_LONG_PERIOD: usize = 50;
pub const RSI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;

/// Lookbacks in 1-minute samples
pub const SHORT_WINDOW: usize = 5;
pub const LONG_WINDOW: usize = 15;

/// Longest lookback: the 50-period EMA
pub const MIN_SAMPLES: usize = EMA_LONG_PERIOD;

/// All indicator values derived from one price series
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IndicatorSnapshot {
    pub as_of: DateTime<Utc>,
    pub latest_price: f64,
    pub change_5m_pct: f64,
    pub change_15m_pct: f64,
    pub ema_20: f64,
    pub ema_50: f64,
    pub rsi_14: f64,
    pub atr_pct: f64,
}

impl IndicatorSnapshot {
    pub fn is_uptrend(&self) -> bool {
        self.ema_20 > self.ema_50
    }
}

/// Compute the indicator snapshot for a series
///
/// Fails with `InsufficientData` below [`MIN_SAMPLES`] samples.
pub fn compute(series: &PriceSeries) -> Result<IndicatorSnapshot, AssetError> {
    let insufficient = || AssetError::InsufficientData {
        required: MIN_SAMPLES,
        available: series.len(),
    };

    if series.len() < MIN_SAMPLES {
        return Err(insufficient());
    }

    let closes = series.closes();
    let latest = series.latest().ok_or_else(insufficient)?;

    Ok(IndicatorSnapshot {
        as_of: latest.timestamp,
        latest_price: latest.close,
        change_5m_pct: pct_change(&closes, SHORT_WINDOW).ok_or_else(insufficient)?,
        change_15m_pct: pct_change(&closes, LONG_WINDOW).ok_or_else(insufficient)?,
        ema_20: calculate_ema(&closes, EMA_SHORT_PERIOD).ok_or_else(insufficient)?,
        ema_50: calculate_ema(&closes, EMA_LONG_PERIOD).ok_or_else(insufficient)?,
        rsi_14: calculate_rsi(&closes, RSI_PERIOD).ok_or_else(insufficient)?,
        atr_pct: calculate_atr_pct(series.candles(), ATR_PERIOD).ok_or_else(insufficient)?,
    })
}
