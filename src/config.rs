use crate::api::ExchangeKind;
use crate::models::{Asset, ThresholdOverrides};
use crate::strategy::Thresholds;
use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "signalbot.toml";
pub const ENV_PREFIX: &str = "SIGNALBOT";
/// Plain override for the global cooldown, checked after the layered config
pub const COOLDOWN_ENV: &str = "COOLDOWN_MINUTES";
/// One year
pub const MAX_COOLDOWN_MINUTES: i64 = 525_600;

/// Full runtime configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub thresholds: Thresholds,
    /// Per-exchange overrides keyed by exchange name
    pub exchanges: BTreeMap<String, ExchangeSettings>,
    pub state: StateSettings,
    pub output: OutputSettings,
    pub telegram: TelegramSettings,
    pub assets: Vec<AssetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub cooldown_minutes: i64,
    pub max_concurrency: usize,
    pub request_timeout_secs: u64,
    /// 1-minute candles requested per asset
    pub candle_limit: usize,
    /// Exchanges tried in this order for every asset
    pub exchange_priority: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cooldown_minutes: 30,
            max_concurrency: 6,
            request_timeout_secs: 8,
            candle_limit: 100,
            exchange_priority: ExchangeKind::ALL.iter().map(|k| k.name().to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    pub base_url: Option<String>,
    pub requests_per_minute: u32,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            requests_per_minute: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateSettings {
    pub path: PathBuf,
    /// When set, state lives in Redis instead of the file
    pub redis_url: Option<String>,
    pub redis_key: String,
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("state/asset_state.json"),
            redis_url: None,
            redis_key: crate::persistence::redis_store::DEFAULT_STATE_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub dir: PathBuf,
    pub snapshot_file: String,
    pub alerts_file: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("out"),
            snapshot_file: "snapshot.txt".to_string(),
            alerts_file: "alerts.txt".to_string(),
        }
    }
}

impl OutputSettings {
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(&self.snapshot_file)
    }

    pub fn alerts_path(&self) -> PathBuf {
        self.dir.join(&self.alerts_file)
    }
}

/// Telegram transport settings. Credentials come from the environment only.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub api_base: String,
    /// Telegram caps messages at 4096 characters
    pub max_message_chars: usize,
    pub update_id_file: PathBuf,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            max_message_chars: 3500,
            update_id_file: PathBuf::from("state/last_update_id.txt"),
        }
    }
}

/// Asset entry as written in the config file
///
/// `quote` derives the native symbol on every configured exchange
/// (`BTCUSDT`, `BTC-USDT`, ...). Entries in `symbols` win over derived ones,
/// and an empty string marks the asset as not listed on that exchange.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetConfig {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub quote: Option<String>,
    #[serde(default)]
    pub symbols: BTreeMap<String, String>,
    #[serde(default)]
    pub thresholds: ThresholdOverrides,
}

impl Settings {
    /// Load layered configuration: defaults, the config file, then
    /// `SIGNALBOT__SECTION__KEY` variables, then `COOLDOWN_MINUTES`.
    ///
    /// An explicitly requested file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (file, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let built = Config::builder()
            .add_source(File::from(file.as_path()).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to build configuration from {}", file.display()))?;

        let mut settings: Settings = built
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        if let Ok(raw) = std::env::var(COOLDOWN_ENV) {
            settings.engine.cooldown_minutes = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be an integer, got {:?}", COOLDOWN_ENV, raw))?;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.cooldown_minutes < 0 {
            bail!("engine.cooldown_minutes must not be negative");
        }
        if self.engine.cooldown_minutes > MAX_COOLDOWN_MINUTES {
            bail!(
                "engine.cooldown_minutes must be at most {} (one year), got {}",
                MAX_COOLDOWN_MINUTES,
                self.engine.cooldown_minutes
            );
        }
        if self.engine.max_concurrency == 0 {
            bail!("engine.max_concurrency must be at least 1");
        }
        if self.engine.request_timeout_secs == 0 {
            bail!("engine.request_timeout_secs must be at least 1");
        }
        self.exchange_priority()?;
        self.assets()?;
        Ok(())
    }

    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.engine.cooldown_minutes.clamp(0, MAX_COOLDOWN_MINUTES))
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.engine.request_timeout_secs)
    }

    /// Exchanges in priority order, validated and de-duplicated
    pub fn exchange_priority(&self) -> Result<Vec<ExchangeKind>> {
        let mut seen = HashSet::new();
        let mut kinds = Vec::new();

        for name in &self.engine.exchange_priority {
            let kind: ExchangeKind = name.parse().map_err(anyhow::Error::msg)?;
            if !seen.insert(kind) {
                bail!("exchange {} listed twice in engine.exchange_priority", kind);
            }
            kinds.push(kind);
        }

        if kinds.is_empty() {
            bail!("engine.exchange_priority is empty");
        }
        Ok(kinds)
    }

    pub fn exchange_settings(&self, kind: ExchangeKind) -> ExchangeSettings {
        self.exchanges.get(kind.name()).cloned().unwrap_or_default()
    }

    pub fn base_url(&self, kind: ExchangeKind) -> String {
        self.exchange_settings(kind)
            .base_url
            .unwrap_or_else(|| kind.default_base_url().to_string())
    }

    /// Resolve asset entries into immutable `Asset`s.
    ///
    /// Rejects an empty list and duplicate canonical symbols.
    pub fn assets(&self) -> Result<Vec<Asset>> {
        if self.assets.is_empty() {
            bail!("no assets configured");
        }

        let exchanges = self.exchange_priority()?;
        let mut seen = HashSet::new();
        let mut assets = Vec::with_capacity(self.assets.len());

        for entry in &self.assets {
            let symbol = entry.symbol.trim().to_uppercase();
            if symbol.is_empty() {
                bail!("asset with empty symbol");
            }
            if !seen.insert(symbol.clone()) {
                bail!("asset {} configured twice", symbol);
            }

            let mut symbols = BTreeMap::new();
            if let Some(quote) = &entry.quote {
                for kind in &exchanges {
                    symbols.insert(
                        kind.name().to_string(),
                        kind.pair_symbol(&symbol, &quote.trim().to_uppercase()),
                    );
                }
            }
            for (exchange, native) in &entry.symbols {
                let exchange = exchange.to_lowercase();
                if native.trim().is_empty() {
                    symbols.remove(&exchange);
                } else {
                    symbols.insert(exchange, native.trim().to_string());
                }
            }

            if symbols.is_empty() {
                tracing::warn!("Asset {} has no exchange mappings and will always be unavailable", symbol);
            }

            assets.push(Asset {
                symbol,
                name: entry.name.clone(),
                symbols,
                thresholds: entry.thresholds.clone(),
            });
        }

        Ok(assets)
    }
}
