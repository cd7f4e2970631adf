#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use signalbot::models::{Candle, PriceSeries};

pub fn start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T08:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Drift down from 108 to 100 in a zigzag (-0.3, +0.1), then rise +0.6 per
/// minute for five minutes: +3% over 5m with RSI still below 70.
pub fn breakout_closes() -> Vec<f64> {
    let mut closes = vec![108.0];
    for i in 0..80 {
        let last = *closes.last().unwrap();
        closes.push(if i % 2 == 0 { last - 0.3 } else { last + 0.1 });
    }
    for _ in 0..5 {
        let last = *closes.last().unwrap();
        closes.push(last + 0.6);
    }
    closes
}

/// Ten minutes after the breakout: a short pause, then another +3%
pub fn second_breakout_closes() -> Vec<f64> {
    let mut closes = breakout_closes();
    for i in 0..5 {
        let last = *closes.last().unwrap();
        closes.push(if i % 2 == 0 { last - 0.3 } else { last + 0.1 });
    }
    let base = *closes.last().unwrap();
    for _ in 0..5 {
        let last = *closes.last().unwrap();
        closes.push(last + base * 0.006);
    }
    closes
}

/// Flat market ticking between 2000 and 2001
pub fn calm_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| if i % 2 == 0 { 2000.0 } else { 2001.0 })
        .collect()
}

/// Candles whose open is the previous close and whose range spans open..close
pub fn candles(closes: &[f64], first: DateTime<Utc>) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: first + Duration::minutes(i as i64),
                open,
                high: open.max(close),
                low: open.min(close),
                close,
            }
        })
        .collect()
}

pub fn series(symbol: &str, closes: &[f64]) -> PriceSeries {
    PriceSeries::from_unordered(symbol, candles(closes, start())).unwrap()
}

/// `/api/v3/klines` body, oldest first
pub fn binance_body(closes: &[f64]) -> String {
    let rows: Vec<_> = candles(closes, start())
        .iter()
        .map(|c| {
            let t = c.timestamp.timestamp_millis();
            json!([
                t,
                c.open.to_string(),
                c.high.to_string(),
                c.low.to_string(),
                c.close.to_string(),
                "1.0",
                t + 59_999,
                "100.0",
                10,
                "0.5",
                "50.0",
                "0"
            ])
        })
        .collect();
    json!(rows).to_string()
}

/// `/api/v5/market/candles` body, newest first
pub fn okx_body(closes: &[f64]) -> String {
    let rows: Vec<_> = candles(closes, start())
        .iter()
        .rev()
        .map(|c| {
            json!([
                c.timestamp.timestamp_millis().to_string(),
                c.open.to_string(),
                c.high.to_string(),
                c.low.to_string(),
                c.close.to_string(),
                "1",
                "100",
                "100",
                "1"
            ])
        })
        .collect();
    json!({ "code": "0", "msg": "", "data": rows }).to_string()
}
