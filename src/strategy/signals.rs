use crate::indicators::IndicatorSnapshot;
use crate::models::{Crossing, Indicator, Severity, ThresholdOverrides};
use serde::{Deserialize, Serialize};

/// RSI is floored at this value when computing the oversold ratio
const RSI_RATIO_FLOOR: f64 = 1.0;

/// Alert thresholds before volatility scaling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    pub change_5m_pct: f64,
    pub change_15m_pct: f64,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    /// K in `base * (1 + ATR% / K)`; larger K means weaker scaling
    pub atr_scale_k: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            change_5m_pct: 2.0,
            change_15m_pct: 3.5,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            atr_scale_k: 1.0,
        }
    }
}

impl Thresholds {
    /// Apply per-asset overrides on top of these values
    pub fn with_overrides(&self, overrides: &ThresholdOverrides) -> Self {
        Self {
            change_5m_pct: overrides.change_5m_pct.unwrap_or(self.change_5m_pct),
            change_15m_pct: overrides.change_15m_pct.unwrap_or(self.change_15m_pct),
            rsi_overbought: overrides.rsi_overbought.unwrap_or(self.rsi_overbought),
            rsi_oversold: overrides.rsi_oversold.unwrap_or(self.rsi_oversold),
            atr_scale_k: self.atr_scale_k,
        }
    }

    /// Multiplier applied to the percentage-change thresholds.
    ///
    /// `1 + ATR% / K`: calm markets keep the base threshold, volatile markets
    /// widen it. RSI bounds are absolute and never scaled.
    pub fn volatility_factor(&self, atr_pct: f64) -> f64 {
        if self.atr_scale_k <= 0.0 || !atr_pct.is_finite() {
            return 1.0;
        }
        1.0 + atr_pct.max(0.0) / self.atr_scale_k
    }
}

/// Every indicator that crossed its (scaled) threshold, in fixed order:
/// 5m change, 15m change, RSI.
pub fn detect_crossings(snapshot: &IndicatorSnapshot, thresholds: &Thresholds) -> Vec<Crossing> {
    let factor = thresholds.volatility_factor(snapshot.atr_pct);
    let mut crossings = Vec::new();

    for (indicator, value, base) in [
        (
            Indicator::Change5m,
            snapshot.change_5m_pct,
            thresholds.change_5m_pct,
        ),
        (
            Indicator::Change15m,
            snapshot.change_15m_pct,
            thresholds.change_15m_pct,
        ),
    ] {
        let threshold = base * factor;
        if threshold <= 0.0 {
            continue;
        }
        let ratio = value.abs() / threshold;
        if ratio >= 1.0 {
            crossings.push(Crossing {
                indicator,
                value,
                threshold,
                ratio,
            });
        }
    }

    let rsi = snapshot.rsi_14;
    if thresholds.rsi_overbought > 0.0 && rsi >= thresholds.rsi_overbought {
        crossings.push(Crossing {
            indicator: Indicator::RsiOverbought,
            value: rsi,
            threshold: thresholds.rsi_overbought,
            ratio: rsi / thresholds.rsi_overbought,
        });
    } else if rsi <= thresholds.rsi_oversold {
        crossings.push(Crossing {
            indicator: Indicator::RsiOversold,
            value: rsi,
            threshold: thresholds.rsi_oversold,
            ratio: thresholds.rsi_oversold / rsi.max(RSI_RATIO_FLOOR),
        });
    }

    crossings
}

/// Largest ratio wins; on equal ratios the earlier crossing is kept
pub fn strongest(crossings: &[Crossing]) -> Option<Crossing> {
    crossings.iter().fold(None, |best: Option<Crossing>, c| match best {
        Some(b) if b.ratio >= c.ratio => Some(b),
        _ => Some(*c),
    })
}

pub fn severity_for(ratio: f64) -> Severity {
    if ratio < 1.5 {
        Severity::Low
    } else if ratio < 2.5 {
        Severity::Medium
    } else {
        Severity::High
    }
}
