pub mod binance;
pub mod bybit;
pub mod http;
pub mod kucoin;
pub mod okx;

pub use binance::BinanceAdapter;
pub use bybit::BybitAdapter;
pub use http::HttpSource;
pub use kucoin::KucoinAdapter;
pub use okx::OkxAdapter;

use crate::error::SourceError;
use crate::models::{Asset, PriceSeries};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Fetches a recent candle series for one asset from one exchange
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Source name used to tag resolved series, e.g. "binance"
    fn name(&self) -> &str;

    /// Fetch recent 1-minute candles for a canonical symbol.
    ///
    /// Exactly one outbound request, no retries.
    async fn fetch(&self, symbol: &str) -> Result<PriceSeries, SourceError>;
}

/// Supported venues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    Binance,
    Okx,
    Bybit,
    Kucoin,
}

impl ExchangeKind {
    pub const ALL: [ExchangeKind; 4] = [
        ExchangeKind::Binance,
        ExchangeKind::Okx,
        ExchangeKind::Bybit,
        ExchangeKind::Kucoin,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ExchangeKind::Binance => "binance",
            ExchangeKind::Okx => "okx",
            ExchangeKind::Bybit => "bybit",
            ExchangeKind::Kucoin => "kucoin",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ExchangeKind::Binance => "https://api.binance.com",
            ExchangeKind::Okx => "https://www.okx.com",
            ExchangeKind::Bybit => "https://api.bybit.com",
            ExchangeKind::Kucoin => "https://api.kucoin.com",
        }
    }

    /// Native pair notation, e.g. ("BTC", "USDT") -> "BTCUSDT" or "BTC-USDT"
    pub fn pair_symbol(&self, base: &str, quote: &str) -> String {
        match self {
            ExchangeKind::Binance | ExchangeKind::Bybit => format!("{}{}", base, quote),
            ExchangeKind::Okx | ExchangeKind::Kucoin => format!("{}-{}", base, quote),
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExchangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExchangeKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown exchange: {}", s))
    }
}

/// Canonical symbol -> native symbol for a single exchange.
///
/// Built once from configuration and never mutated.
#[derive(Debug, Clone, Default)]
pub struct SymbolMap {
    exchange: String,
    by_canonical: HashMap<String, String>,
}

impl SymbolMap {
    pub fn for_exchange(exchange: &str, assets: &[Asset]) -> Self {
        let by_canonical = assets
            .iter()
            .filter_map(|asset| {
                asset
                    .native_symbol(exchange)
                    .map(|native| (asset.symbol.clone(), native.to_string()))
            })
            .collect();

        Self {
            exchange: exchange.to_string(),
            by_canonical,
        }
    }

    pub fn lookup(&self, symbol: &str) -> Result<&str, SourceError> {
        self.by_canonical
            .get(symbol)
            .map(String::as_str)
            .ok_or_else(|| SourceError::UnsupportedSymbol {
                exchange: self.exchange.clone(),
                symbol: symbol.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.by_canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_canonical.is_empty()
    }
}

/// Build a boxed adapter for `kind`
pub fn build_adapter(
    kind: ExchangeKind,
    http: HttpSource,
    symbols: SymbolMap,
    limit: usize,
) -> Box<dyn ExchangeAdapter> {
    match kind {
        ExchangeKind::Binance => Box::new(BinanceAdapter::new(http, symbols, limit)),
        ExchangeKind::Okx => Box::new(OkxAdapter::new(http, symbols, limit)),
        ExchangeKind::Bybit => Box::new(BybitAdapter::new(http, symbols, limit)),
        ExchangeKind::Kucoin => Box::new(KucoinAdapter::new(http, symbols, limit)),
    }
}
