use thiserror::Error;

/// Failure of a single adapter call. The resolver turns these into a fallback
/// to the next exchange; they never escape an asset's processing.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    #[error("{exchange} has no symbol mapping for {symbol}")]
    UnsupportedSymbol { exchange: String, symbol: String },

    #[error("{exchange} unavailable: {reason}")]
    SourceUnavailable { exchange: String, reason: String },
}

impl SourceError {
    pub fn unavailable(exchange: &str, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            exchange: exchange.to_string(),
            reason: reason.into(),
        }
    }
}

/// One entry of the diagnostics list carried by `AllSourcesUnavailable`
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    pub source: String,
    pub error: SourceError,
}

/// Terminal per-asset errors. The asset is reported as unavailable and its
/// state is left untouched.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AssetError {
    #[error("all sources unavailable for {symbol} ({})", format_failures(.failures))]
    AllSourcesUnavailable {
        symbol: String,
        failures: Vec<SourceFailure>,
    },

    #[error("insufficient data: need {required} samples, got {available}")]
    InsufficientData { required: usize, available: usize },
}

fn format_failures(failures: &[SourceFailure]) -> String {
    if failures.is_empty() {
        return "no sources configured".to_string();
    }
    failures
        .iter()
        .map(|f| f.error.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state corrupt: {0}")]
    StateCorrupt(String),

    #[error("state I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis connection timeout after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("telegram request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("telegram rejected request: {0}")]
    Rejected(String),
}
