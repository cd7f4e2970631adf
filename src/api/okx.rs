use super::http::{parse_millis, parse_price, HttpSource};
use super::{ExchangeAdapter, SymbolMap};
use crate::error::SourceError;
use crate::models::{Candle, PriceSeries};
use async_trait::async_trait;
use serde::Deserialize;

const CANDLES_PATH: &str = "/api/v5/market/candles";
const MAX_LIMIT: usize = 300;

/// OKX spot candles. Native symbols look like `BTC-USDT`.
pub struct OkxAdapter {
    http: HttpSource,
    symbols: SymbolMap,
    limit: usize,
}

/// Envelope of every OKX v5 response. `code == "0"` means success.
#[derive(Debug, Deserialize)]
struct OkxResponse {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<Vec<String>>,
}

impl OkxAdapter {
    pub fn new(http: HttpSource, symbols: SymbolMap, limit: usize) -> Self {
        Self {
            http,
            symbols,
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for OkxAdapter {
    fn name(&self) -> &str {
        self.http.exchange()
    }

    async fn fetch(&self, symbol: &str) -> Result<PriceSeries, SourceError> {
        let native = self.symbols.lookup(symbol)?;

        let response: OkxResponse = self
            .http
            .get_json(
                CANDLES_PATH,
                &[
                    ("instId", native.to_string()),
                    ("bar", "1m".to_string()),
                    ("limit", self.limit.to_string()),
                ],
            )
            .await?;

        normalize(symbol, response).map_err(|reason| self.http.unavailable(reason))
    }
}

/// Rows are `[ts, o, h, l, c, vol, volCcy, volCcyQuote, confirm]`, newest first
fn normalize(symbol: &str, response: OkxResponse) -> Result<PriceSeries, String> {
    if response.code != "0" {
        return Err(format!("okx error {}: {}", response.code, response.msg));
    }

    let candles = response
        .data
        .iter()
        .map(|row| {
            if row.len() < 5 {
                return Err(format!("candle row has {} fields, expected >= 5", row.len()));
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
