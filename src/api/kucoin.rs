use super::http::{parse_price, parse_seconds, HttpSource};
use super::{ExchangeAdapter, SymbolMap};
use crate::error::SourceError;
use crate::models::{Candle, PriceSeries};
use async_trait::async_trait;
use serde::Deserialize;

const CANDLES_PATH: &str = "/api/v1/market/candles";
const SUCCESS_CODE: &str = "200000";

/// KuCoin spot candles. Native symbols look like `BTC-USDT`.
///
/// The endpoint has no limit parameter and returns up to 1500 rows; the
/// adapter keeps the most recent `limit`.
pub struct KucoinAdapter {
    http: HttpSource,
    symbols: SymbolMap,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct KucoinResponse {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<Vec<String>>,
}

impl KucoinAdapter {
    pub fn new(http: HttpSource, symbols: SymbolMap, limit: usize) -> Self {
        Self {
            http,
            symbols,
            limit: limit.max(1),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for KucoinAdapter {
    fn name(&self) -> &str {
        self.http.exchange()
    }

    async fn fetch(&self, symbol: &str) -> Result<PriceSeries, SourceError> {
        let native = self.symbols.lookup(symbol)?;

        let response: KucoinResponse = self
            .http
            .get_json(
                CANDLES_PATH,
                &[
                    ("type", "1min".to_string()),
                    ("symbol", native.to_string()),
                ],
            )
            .await?;

        normalize(symbol, response)
            .map(|series| series.truncate_to_latest(self.limit))
            .map_err(|reason| self.http.unavailable(reason))
    }
}

/// Rows are `[time, open, close, high, low, volume, turnover]`, time in
/// seconds, newest first. Note close comes before high/low.
fn normalize(symbol: &str, response: KucoinResponse) -> Result<PriceSeries, String> {
    if response.code != SUCCESS_CODE {
        return Err(format!("kucoin error {}: {}", response.code, response.msg));
    }

    let candles = response
        .data
        .iter()
        .map(|row| {
            if row.len() < 5 {
                return Err(format!("candle row has {} fields, expected >= 5", row.len()));
            }
            Ok(Candle {
                timestamp: parse_seconds(&row[0])?,
                open: parse_price("open", &row[1])?,
                close: parse_price("close", &row[2])?,
                high: parse_price("high", &row[3])?,
                low: parse_price("low", &row[4])?,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    PriceSeries::from_unordered(symbol, candles)
}
