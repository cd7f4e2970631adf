use super::http::{parse_price, HttpSource};
use super::{ExchangeAdapter, SymbolMap};
use crate::error::SourceError;
use crate::models::{Candle, PriceSeries};
use async_trait::async_trait;
use chrono::DateTime;
use serde::de::IgnoredAny;
use serde::Deserialize;

const KLINES_PATH: &str = "/api/v3/klines";
const MAX_LIMIT: usize = 1000;

/// Binance spot klines. Native symbols look like `BTCUSDT`.
pub struct BinanceAdapter {
    http: HttpSource,
    symbols: SymbolMap,
    limit: usize,
}

/// One row of `/api/v3/klines`:
/// `[openTime, open, high, low, close, volume, closeTime, quoteVolume,
///   trades, takerBase, takerQuote, ignore]`
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Kline(
    i64,
    String,
    String,
    String,
    String,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
);

impl BinanceAdapter {
    pub fn new(http: HttpSource, symbols: SymbolMap, limit: usize) -> Self {
        Self {
            http,
            symbols,
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceAdapter {
    fn name(&self) -> &str {
        self.http.exchange()
    }

    async fn fetch(&self, symbol: &str) -> Result<PriceSeries, SourceError> {
        let native = self.symbols.lookup(symbol)?;

        let rows: Vec<Kline> = self
            .http
            .get_json(
                KLINES_PATH,
                &[
                    ("symbol", native.to_string()),
                    ("interval", "1m".to_string()),
                    ("limit", self.limit.to_string()),
                ],
            )
            .await?;

        let series = normalize(symbol, rows).map_err(|reason| self.http.unavailable(reason))?;

        tracing::debug!(
            asset = %symbol,
            native = %native,
            samples = series.len(),
            "Fetched Binance klines"
        );

        Ok(series)
    }
}

fn normalize(symbol: &str, rows: Vec<Kline>) -> Result<PriceSeries, String> {
    let candles = rows
        .into_iter()
        .map(|row| {
            let timestamp = DateTime::from_timestamp_millis(row.0)
                .ok_or_else(|| format!("invalid open time {}", row.0))?;
            Ok(Candle {
                timestamp,
                open: parse_price("open", &row.1)?,
                high: parse_price("high", &row.2)?,
                low: parse_price("low", &row.3)?,
                close: parse_price("close", &row.4)?,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    PriceSeries::from_unordered(symbol, candles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Asset;
    use mockito::Matcher;
    use serde_json::json;
    use std::time::Duration;

    const T0: i64 = 1_700_000_000_000;

    fn klines_body(count: usize) -> String {
        let rows: Vec<_> = (0..count)
            .map(|i| {
                let close = 100.0 + i as f64;
                json!([
                    T0 + i as i64 * 60_000,
                    format!("{:.2}", close - 0.5),
                    format!("{:.2}", close + 1.0),
                    format!("{:.2}", close - 1.0),
                    format!("{:.2}", close),
                    "12.5",
                    T0 + i as i64 * 60_000 + 59_999,
                    "1250.0",
                    42,
                    "6.0",
                    "600.0",
                    "0"
                ])
            })
            .collect();
        serde_json::Value::Array(rows).to_string()
    }

    fn adapter(url: &str) -> BinanceAdapter {
        let assets = vec![Asset {
            symbol: "BTC".to_string(),
            name: None,
            symbols: [("binance".to_string(), "BTCUSDT".to_string())].into(),
            thresholds: Default::default(),
        }];
        let http = HttpSource::new("binance", url, Duration::from_secs(2), 600).unwrap();
        BinanceAdapter::new(http, SymbolMap::for_exchange("binance", &assets), 60)
    }

    #[test]
    fn test_normalize_fixture() {
        let rows: Vec<Kline> = serde_json::from_str(&klines_body(3)).unwrap();
        let series = normalize("BTC", rows).unwrap();

        assert_eq!(series.closes(), vec![100.0, 101.0, 102.0]);
        assert_eq!(series.candles()[0].high, 101.0);
        assert_eq!(series.candles()[0].timestamp.timestamp_millis(), T0);
    }

    #[test]
    fn test_row_with_wrong_arity_is_rejected() {
        let body = r#"[[1700000000000, "1", "2", "0.5", "1.5"]]"#;
        assert!(serde_json::from_str::<Vec<Kline>>(body).is_err());
    }

    #[tokio::test]
    async fn test_fetch_uses_native_symbol() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", KLINES_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()),
                Matcher::UrlEncoded("interval".into(), "1m".into()),
                Matcher::UrlEncoded("limit".into(), "60".into()),
            ]))
            .with_status(200)
            .with_body(klines_body(60))
            .create_async()
            .await;

        let series = adapter(&server.url()).fetch("BTC").await.unwrap();

        assert_eq!(series.len(), 60);
        assert_eq!(series.symbol(), "BTC");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_unmapped_symbol_makes_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = adapter(&server.url()).fetch("KAS").await.unwrap_err();

        assert!(matches!(err, SourceError::UnsupportedSymbol { .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_invalid_symbol_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", KLINES_PATH)
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":-1121,"msg":"Invalid symbol."}"#)
            .create_async()
            .await;

        let err = adapter(&server.url()).fetch("BTC").await.unwrap_err();

        assert!(matches!(err, SourceError::SourceUnavailable { .. }));
        assert!(err.to_string().contains("Invalid symbol"));
    }
}
