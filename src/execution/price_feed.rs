use crate::api::ExchangeAdapter;
use crate::error::{AssetError, SourceFailure};
use crate::models::PriceSeries;

/// A series together with the adapter that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub series: PriceSeries,
    pub source: String,
}

/// Ordered list of exchange adapters, highest priority first
///
/// Resolution walks the list and returns the first success. Exactly one
/// source's data is used per asset; nothing is merged across sources.
pub struct PriceFeed {
    adapters: Vec<Box<dyn ExchangeAdapter>>,
}

impl PriceFeed {
    pub fn new(adapters: Vec<Box<dyn ExchangeAdapter>>) -> Self {
        Self { adapters }
    }

    /// Source names in priority order
    pub fn sources(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub async fn resolve(&self, symbol: &str) -> Result<Resolved, AssetError> {
        resolve(symbol, &self.adapters).await
    }
}

/// Try each adapter in order until one returns a usable series
pub async fn resolve(
    symbol: &str,
    adapters: &[Box<dyn ExchangeAdapter>],
) -> Result<Resolved, AssetError> {
    let mut failures = Vec::new();

    for adapter in adapters {
        match adapter.fetch(symbol).await {
            Ok(series) => {
                if !failures.is_empty() {
                    tracing::info!(
                        asset = %symbol,
                        source = %adapter.name(),
                        skipped = failures.len(),
                        "Resolved via fallback source"
                    );
                }
                return Ok(Resolved {
                    series,
                    source: adapter.name().to_string(),
                });
            }
            Err(e) => {
                tracing::warn!(asset = %symbol, source = %adapter.name(), "{}", e);
                failures.push(SourceFailure {
                    source: adapter.name().to_string(),
                    error: e,
                });
            }
        }
    }

    Err(AssetError::AllSourcesUnavailable {
        symbol: symbol.to_string(),
        failures,
    })
}
