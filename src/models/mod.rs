use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A tracked asset as loaded from configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    /// Canonical symbol, e.g. "BTC"
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Exchange name -> native symbol (e.g. "binance" -> "BTCUSDT")
    #[serde(default)]
    pub symbols: BTreeMap<String, String>,
    #[serde(default)]
    pub thresholds: ThresholdOverrides,
}

impl Asset {
    /// Label used in reports, e.g. "Bitcoin (BTC)"
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({})", name, self.symbol),
            None => self.symbol.clone(),
        }
    }

    pub fn native_symbol(&self, exchange: &str) -> Option<&str> {
        self.symbols.get(exchange).map(String::as_str)
    }
}

/// Per-asset threshold overrides; unset fields fall back to the global values
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThresholdOverrides {
    pub change_5m_pct: Option<f64>,
    pub change_15m_pct: Option<f64>,
    pub rsi_overbought: Option<f64>,
    pub rsi_oversold: Option<f64>,
}

/// One 1-minute OHLC candle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Candles for one asset, strictly ascending by timestamp.
///
/// Only constructible through [`PriceSeries::from_unordered`], which enforces
/// ordering, uniqueness and sane prices.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    candles: Vec<Candle>,
}

impl PriceSeries {
    /// Sort candles ascending and validate them.
    ///
    /// Exchanges return newest-first or oldest-first; both are accepted.
    /// Duplicate timestamps, non-finite or non-positive prices are rejected.
    pub fn from_unordered(
        symbol: impl Into<String>,
        mut candles: Vec<Candle>,
    ) -> std::result::Result<Self, String> {
        if candles.is_empty() {
            return Err("empty candle list".to_string());
        }

        for candle in &candles {
            let prices = [candle.open, candle.high, candle.low, candle.close];
            if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
                return Err(format!(
                    "invalid price in candle at {}",
                    candle.timestamp.to_rfc3339()
                ));
            }
            if candle.high < candle.low {
                return Err(format!(
                    "high below low in candle at {}",
                    candle.timestamp.to_rfc3339()
                ));
            }
        }

        candles.sort_by_key(|c| c.timestamp);

        if let Some(window) = candles
            .windows(2)
            .find(|w| w[0].timestamp == w[1].timestamp)
        {
            return Err(format!(
                "duplicate timestamp {}",
                window[0].timestamp.to_rfc3339()
            ));
        }

        Ok(Self {
            symbol: symbol.into(),
            candles,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Keep only the most recent `n` candles
    pub fn truncate_to_latest(mut self, n: usize) -> Self {
        if self.candles.len() > n {
            let drop = self.candles.len() - n;
            self.candles.drain(..drop);
        }
        self
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.last()
    }
}

/// Persisted per-asset alert metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetState {
    pub last_alert_timestamp: DateTime<Utc>,
    pub last_price: Option<f64>,
    pub last_status: String,
}

impl Default for AssetState {
    fn default() -> Self {
        Self {
            last_alert_timestamp: DateTime::<Utc>::UNIX_EPOCH,
            last_price: None,
            last_status: "none".to_string(),
        }
    }
}

impl AssetState {
    pub fn has_alerted(&self) -> bool {
        self.last_alert_timestamp > DateTime::<Utc>::UNIX_EPOCH
    }
}

/// Canonical symbol -> state. Ordered so persisted output is stable.
pub type StateMap = BTreeMap<String, AssetState>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// Indicator that crossed its threshold
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Indicator {
    Change5m,
    Change15m,
    RsiOverbought,
    RsiOversold,
}

impl Indicator {
    pub fn is_rsi(&self) -> bool {
        matches!(self, Indicator::RsiOverbought | Indicator::RsiOversold)
    }
}

/// The winning threshold crossing behind a decision
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Crossing {
    pub indicator: Indicator,
    pub value: f64,
    /// Effective (volatility-scaled) threshold the value was compared to
    pub threshold: f64,
    /// Magnitude relative to the threshold; >= 1.0 means crossed
    pub ratio: f64,
}

impl Crossing {
    pub fn reason(&self) -> &'static str {
        match self.indicator {
            Indicator::Change5m if self.value >= 0.0 => "5m breakout",
            Indicator::Change5m => "5m breakdown",
            Indicator::Change15m if self.value >= 0.0 => "15m breakout",
            Indicator::Change15m => "15m breakdown",
            Indicator::RsiOverbought => "RSI overbought",
            Indicator::RsiOversold => "RSI oversold",
        }
    }
}

/// Per-asset, per-cycle alert decision
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertDecision {
    pub asset: String,
    pub fires: bool,
    pub reason: String,
    pub severity: Severity,
    /// Strongest crossing, present even when suppressed by cooldown
    pub crossing: Option<Crossing>,
}
