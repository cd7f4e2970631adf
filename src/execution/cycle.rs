use super::price_feed::PriceFeed;
use crate::api::http::HttpSource;
use crate::api::{build_adapter, SymbolMap};
use crate::config::Settings;
use crate::error::{AssetError, StateError};
use crate::indicators::{self, IndicatorSnapshot};
use crate::models::{AlertDecision, Asset, AssetState, StateMap};
use crate::notify::StatusSource;
use crate::persistence::StateStore;
use crate::report::render_snapshot;
use crate::strategy::{AlertPhase, DecisionEngine};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

/// What happened to one asset in one cycle
#[derive(Debug, Clone, PartialEq)]
pub enum AssetOutcome {
    Evaluated {
        source: String,
        snapshot: IndicatorSnapshot,
        decision: AlertDecision,
        /// Phase after this cycle's decision
        phase: AlertPhase,
    },
    Unavailable {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetResult {
    pub asset: Asset,
    pub outcome: AssetOutcome,
}

impl AssetResult {
    pub fn fired(&self) -> bool {
        matches!(&self.outcome, AssetOutcome::Evaluated { decision, .. } if decision.fires)
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self.outcome, AssetOutcome::Unavailable { .. })
    }
}

/// Everything one `run` produced
#[derive(Debug)]
pub struct CycleReport {
    pub now: DateTime<Utc>,
    /// In configuration order
    pub results: Vec<AssetResult>,
    /// State as saved at the end of the cycle
    pub states: StateMap,
}

impl CycleReport {
    pub fn fired(&self) -> usize {
        self.results.iter().filter(|r| r.fired()).count()
    }

    pub fn unavailable(&self) -> usize {
        self.results.iter().filter(|r| r.is_unavailable()).count()
    }
}

/// One pass over every configured asset: resolve, compute, decide.
pub struct SignalCycle {
    assets: Vec<Asset>,
    feed: PriceFeed,
    engine: DecisionEngine,
    max_concurrency: usize,
}

impl SignalCycle {
    pub fn new(
        assets: Vec<Asset>,
        feed: PriceFeed,
        engine: DecisionEngine,
        max_concurrency: usize,
    ) -> Self {
        Self {
            assets,
            feed,
            engine,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Wire adapters, resolver and decision engine from configuration
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let assets = settings.assets()?;
        let mut adapters = Vec::new();

        for kind in settings.exchange_priority()? {
            let exchange = settings.exchange_settings(kind);
            let symbols = SymbolMap::for_exchange(kind.name(), &assets);
            if symbols.is_empty() {
                tracing::debug!("No assets mapped on {}, skipping adapter", kind);
                continue;
            }

            let http = HttpSource::new(
                kind.name(),
                &settings.base_url(kind),
                settings.request_timeout(),
                exchange.requests_per_minute,
            )
            .with_context(|| format!("Failed to set up {} client", kind))?;

            tracing::debug!("{} adapter: {} assets mapped", kind, symbols.len());
            adapters.push(build_adapter(kind, http, symbols, settings.engine.candle_limit));
        }

        let engine = DecisionEngine::new(settings.thresholds, settings.cooldown());

        Ok(Self::new(
            assets,
            PriceFeed::new(adapters),
            engine,
            settings.engine.max_concurrency,
        ))
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn sources(&self) -> Vec<&str> {
        self.feed.sources()
    }

    /// Evaluate every asset against `previous` without touching storage.
    ///
    /// Returns results in configuration order and the next state map.
    /// Unavailable assets keep their previous state.
    pub async fn evaluate(
        &self,
        previous: &StateMap,
        now: DateTime<Utc>,
    ) -> (Vec<AssetResult>, StateMap) {
        // items must not borrow from self.assets: LiveStatus needs this future to be Send
        let jobs: Vec<(usize, Asset, AssetState)> = self
            .assets
            .iter()
            .enumerate()
            .map(|(idx, asset)| {
                let prior = previous.get(&asset.symbol).cloned().unwrap_or_default();
                (idx, asset.clone(), prior)
            })
            .collect();

        let mut evaluated = stream::iter(jobs)
            .map(move |(idx, asset, prior)| self.evaluate_job(idx, asset, prior, now))
            .buffer_unordered(self.max_concurrency)
            .collect::<Vec<_>>()
            .await;

        // completion order is arbitrary
        evaluated.sort_by_key(|(idx, _, _)| *idx);

        let mut states = previous.clone();
        let mut results = Vec::with_capacity(evaluated.len());
        for (_, result, next) in evaluated {
            if let Some(next) = next {
                states.insert(result.asset.symbol.clone(), next);
            }
            results.push(result);
        }

        (results, states)
    }

    async fn evaluate_job(
        &self,
        idx: usize,
        asset: Asset,
        prior: AssetState,
        now: DateTime<Utc>,
    ) -> (usize, AssetResult, Option<AssetState>) {
        let (result, next) = self.evaluate_asset(&asset, &prior, now).await;
        (idx, result, next)
    }

    async fn evaluate_asset(
        &self,
        asset: &Asset,
        previous: &AssetState,
        now: DateTime<Utc>,
    ) -> (AssetResult, Option<AssetState>) {
        match self.try_evaluate(asset, previous, now).await {
            Ok((outcome, next)) => (
                AssetResult {
                    asset: asset.clone(),
                    outcome,
                },
                Some(next),
            ),
            Err(e) => {
                tracing::warn!(asset = %asset.symbol, "❌ Unavailable: {}", e);
                (
                    AssetResult {
                        asset: asset.clone(),
                        outcome: AssetOutcome::Unavailable {
                            reason: e.to_string(),
                        },
                    },
                    None,
                )
            }
        }
    }

    async fn try_evaluate(
        &self,
        asset: &Asset,
        previous: &AssetState,
        now: DateTime<Utc>,
    ) -> std::result::Result<(AssetOutcome, AssetState), AssetError> {
        let resolved = self.feed.resolve(&asset.symbol).await?;
        let snapshot = indicators::compute(&resolved.series)?;
        let (decision, next) = self.engine.decide(asset, &snapshot, previous, now);

        let phase = if decision.fires {
            AlertPhase::Alerted
        } else {
            self.engine.phase(previous, now)
        };

        tracing::debug!(
            asset = %asset.symbol,
            source = %resolved.source,
            price = snapshot.latest_price,
            rsi = snapshot.rsi_14,
            reason = %decision.reason,
            "Evaluated"
        );

        Ok((
            AssetOutcome::Evaluated {
                source: resolved.source,
                snapshot,
                decision,
                phase,
            },
            next,
        ))
    }

    /// Full cycle: load state once, evaluate, save state once
    pub async fn run(
        &self,
        store: &mut StateStore,
        now: DateTime<Utc>,
    ) -> std::result::Result<CycleReport, StateError> {
        let previous = store.load_or_reset().await?;
        tracing::info!(
            "🔄 Cycle start: {} assets, {} states loaded from {}",
            self.assets.len(),
            previous.len(),
            store.describe()
        );

        let (results, states) = self.evaluate(&previous, now).await;
        store.save(&states).await?;

        let report = CycleReport {
            now,
            results,
            states,
        };
        tracing::info!(
            "✅ Cycle done: {} fired, {} unavailable",
            report.fired(),
            report.unavailable()
        );

        Ok(report)
    }

    /// Evaluate without persisting anything
    pub async fn snapshot(&self, previous: &StateMap, now: DateTime<Utc>) -> Vec<AssetResult> {
        self.evaluate(previous, now).await.0
    }
}

/// `/status` answered from a fresh read-only evaluation
pub struct LiveStatus<'a> {
    cycle: &'a SignalCycle,
    states: StateMap,
}

impl<'a> LiveStatus<'a> {
    pub fn new(cycle: &'a SignalCycle, states: StateMap) -> Self {
        Self { cycle, states }
    }
}

#[async_trait]
impl<'a> StatusSource for LiveStatus<'a> {
    async fn status_report(&self) -> Result<String> {
        let now = Utc::now();
        let results = self.cycle.snapshot(&self.states, now).await;
        Ok(render_snapshot(&results, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ExchangeAdapter;
    use crate::error::SourceError;
    use crate::models::{Candle, PriceSeries};
    use crate::persistence::FileStateStore;
    use crate::strategy::Thresholds;
    use chrono::Duration;
    use std::collections::HashMap;

    /// Serves canned closes per symbol; unknown symbols are unavailable
    struct CannedAdapter {
        name: &'static str,
        closes: HashMap<&'static str, Vec<f64>>,
    }

    #[async_trait]
    impl ExchangeAdapter for CannedAdapter {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, symbol: &str) -> std::result::Result<PriceSeries, SourceError> {
            let closes = self
                .closes
                .get(symbol)
                .ok_or_else(|| SourceError::unavailable(self.name, "HTTP 503"))?;
            let start = DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_000);
            let candles = closes
                .iter()
                .enumerate()
                .map(|(i, &close)| Candle {
                    timestamp: start + Duration::minutes(i as i64),
                    open: close,
                    high: close * 1.0005,
                    low: close * 0.9995,
                    close,
                })
                .collect();
            PriceSeries::from_unordered(symbol, candles)
                .map_err(|e| SourceError::unavailable(self.name, e))
        }
    }

    fn asset(symbol: &str) -> Asset {
        Asset {
            symbol: symbol.to_string(),
            name: None,
            symbols: Default::default(),
            thresholds: Default::default(),
        }
    }

    fn calm(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| if i % 2 == 0 { 100.0 } else { 100.1 })
            .collect()
    }

    fn spiking(n: usize) -> Vec<f64> {
        let mut closes = calm(n - 5);
        for step in 1..=5 {
            closes.push(100.0 + step as f64 * 1.6);
        }
        closes
    }

    fn cycle() -> SignalCycle {
        let adapter = CannedAdapter {
            name: "binance",
            closes: HashMap::from([
                ("BTC", spiking(100)),
                ("ETH", calm(100)),
                ("SEI", calm(20)),
            ]),
        };
        SignalCycle::new(
            vec![asset("BTC"), asset("KAS"), asset("ETH"), asset("SEI")],
            PriceFeed::new(vec![Box::new(adapter)]),
            DecisionEngine::new(Thresholds::default(), Duration::minutes(30)),
            2,
        )
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T10:15:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_evaluate_keeps_config_order() {
        let (results, _) = cycle().evaluate(&StateMap::new(), now()).await;

        let order: Vec<&str> = results.iter().map(|r| r.asset.symbol.as_str()).collect();
        assert_eq!(order, vec!["BTC", "KAS", "ETH", "SEI"]);

        assert!(results[0].fired());
        assert!(results[1].is_unavailable());
        assert!(!results[2].fired());
        assert!(!results[2].is_unavailable());
        match &results[3].outcome {
            AssetOutcome::Unavailable { reason } => {
                assert!(reason.contains("insufficient data"), "{}", reason)
            }
            other => panic!("expected unavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unavailable_asset_state_untouched() {
        let mut previous = StateMap::new();
        let kas_state = AssetState {
            last_alert_timestamp: now() - Duration::hours(3),
            last_price: Some(0.12),
            last_status: "RSI oversold".to_string(),
        };
        previous.insert("KAS".to_string(), kas_state.clone());

        let (_, states) = cycle().evaluate(&previous, now()).await;

        assert_eq!(states["KAS"], kas_state);
        assert_eq!(states["BTC"].last_alert_timestamp, now());
        assert_eq!(states["ETH"].last_status, "none");
        assert!(states["ETH"].last_price.is_some());
        assert!(!states.contains_key("SEI"));
    }

    #[tokio::test]
    async fn test_run_persists_once_and_respects_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asset_state.json");
        let mut store = StateStore::File(FileStateStore::new(&path));
        let cycle = cycle();

        let first = cycle.run(&mut store, now()).await.unwrap();
        assert_eq!(first.fired(), 1);
        assert_eq!(first.unavailable(), 2);
        assert!(path.exists());

        let second = cycle
            .run(&mut store, now() + Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(second.fired(), 0);
        match &second.results[0].outcome {
            AssetOutcome::Evaluated {
                decision, phase, ..
            } => {
                assert_eq!(decision.reason, "cooldown active");
                assert_eq!(*phase, AlertPhase::Cooldown);
            }
            other => panic!("expected evaluated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_snapshot_does_not_persist() {
        let cycle = cycle();
        let results = cycle.snapshot(&StateMap::new(), now()).await;
        assert_eq!(results.len(), 4);

        let status = LiveStatus::new(&cycle, StateMap::new());
        let text = status.status_report().await.unwrap();
        assert!(text.starts_with("📈 Signal Snapshot"));
        assert!(text.contains("KAS: unavailable"));
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn test_live_status_behind_trait_object() {
        let cycle = cycle();
        let previous = StateMap::new();
        assert_send(&cycle.evaluate(&previous, now()));
        assert_send(&cycle.snapshot(&previous, now()));

        let live = LiveStatus::new(&cycle, StateMap::new());
        let source: &dyn StatusSource = &live;
        let pending = source.status_report();
        assert_send(&pending);

        let text = pending.await.unwrap();
        assert!(text.contains("BTC"));
        assert!(text.contains("SEI: unavailable"));
    }

    #[tokio::test]
    async fn test_short_series_from_preferred_source_still_wins() {
        let preferred = CannedAdapter {
            name: "binance",
            closes: HashMap::from([("SEI", calm(20))]),
        };
        let backup = CannedAdapter {
            name: "okx",
            closes: HashMap::from([("SEI", calm(100))]),
        };
        let cycle = SignalCycle::new(
            vec![asset("SEI")],
            PriceFeed::new(vec![Box::new(preferred), Box::new(backup)]),
            DecisionEngine::new(Thresholds::default(), Duration::minutes(30)),
            1,
        );

        let (results, states) = cycle.evaluate(&StateMap::new(), now()).await;

        match &results[0].outcome {
            AssetOutcome::Unavailable { reason } => {
                assert_eq!(reason, "insufficient data: need 50 samples, got 20")
            }
            other => panic!("expected unavailable, got {:?}", other),
        }
        assert!(states.is_empty());
    }
}
