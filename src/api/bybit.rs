use super::http::{parse_millis, parse_price, HttpSource};
use super::{ExchangeAdapter, SymbolMap};
use crate::error::SourceError;
use crate::models::{Candle, PriceSeries};
use async_trait::async_trait;
use serde::Deserialize;

const KLINE_PATH: &str = "/v5/market/kline";
const MAX_LIMIT: usize = 1000;

/// Bybit v5 spot klines. Native symbols look like `BTCUSDT`.
pub struct BybitAdapter {
    http: HttpSource,
    symbols: SymbolMap,
    limit: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitResponse {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    #[serde(default)]
    result: Option<KlineResult>,
}

#[derive(Debug, Deserialize)]
struct KlineResult {
    #[serde(default)]
    list: Vec<Vec<String>>,
}

impl BybitAdapter {
    pub fn new(http: HttpSource, symbols: SymbolMap, limit: usize) -> Self {
        Self {
            http,
            symbols,
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for BybitAdapter {
    fn name(&self) -> &str {
        self.http.exchange()
    }

    async fn fetch(&self, symbol: &str) -> Result<PriceSeries, SourceError> {
        let native = self.symbols.lookup(symbol)?;

        let response: BybitResponse = self
            .http
            .get_json(
                KLINE_PATH,
                &[
                    ("category", "spot".to_string()),
                    ("symbol", native.to_string()),
                    ("interval", "1".to_string()),
                    ("limit", self.limit.to_string()),
                ],
            )
            .await?;

        normalize(symbol, response).map_err(|reason| self.http.unavailable(reason))
    }
}

/// Rows are `[startTime, open, high, low, close, volume, turnover]`, newest first
fn normalize(symbol: &str, response: BybitResponse) -> Result<PriceSeries, String> {
    if response.ret_code != 0 {
        return Err(format!(
            "bybit error {}: {}",
            response.ret_code, response.ret_msg
        ));
    }

    let result = response
        .result
        .ok_or_else(|| "missing result object".to_string())?;

    let candles = result
        .list
        .iter()
        .map(|row| {
            if row.len() < 5 {
                return Err(format!("kline row has {} fields, expected >= 5", row.len()));
            }
            Ok(Candle {
                timestamp: parse_millis(&row[0])?,
                open: parse_price("open", &row[1])?,
                high: parse_price("high", &row[2])?,
                low: parse_price("low", &row[3])?,
                close: parse_price("close", &row[4])?,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    PriceSeries::from_unordered(symbol, candles)
}
