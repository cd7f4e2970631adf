use super::signals::{detect_crossings, severity_for, strongest, Thresholds};
use crate::indicators::IndicatorSnapshot;
use crate::models::{AlertDecision, Asset, AssetState, Severity};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const REASON_COOLDOWN: &str = "cooldown active";
pub const REASON_QUIET: &str = "within thresholds";

/// Where an asset sits in the alert cycle `Idle -> Alerted -> Cooldown -> Idle`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertPhase {
    Idle,
    Alerted,
    Cooldown,
}

impl AlertPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertPhase::Idle => "idle",
            AlertPhase::Alerted => "alerted",
            AlertPhase::Cooldown => "cooldown",
        }
    }
}

/// Volatility-adaptive threshold check plus per-asset cooldown.
///
/// Pure: the previous state and `now` go in, the decision and next state come
/// out. Nothing is read from the wall clock.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    thresholds: Thresholds,
    cooldown: Duration,
}

impl DecisionEngine {
    pub fn new(thresholds: Thresholds, cooldown: Duration) -> Self {
        Self {
            thresholds,
            cooldown,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Phase of an asset before this cycle's decision
    pub fn phase(&self, state: &AssetState, now: DateTime<Utc>) -> AlertPhase {
        if !state.has_alerted() {
            return AlertPhase::Idle;
        }
        if now - state.last_alert_timestamp < self.cooldown {
            AlertPhase::Cooldown
        } else {
            AlertPhase::Idle
        }
    }

    pub fn decide(
        &self,
        asset: &Asset,
        snapshot: &IndicatorSnapshot,
        previous: &AssetState,
        now: DateTime<Utc>,
    ) -> (AlertDecision, AssetState) {
        let thresholds = self.thresholds.with_overrides(&asset.thresholds);
        let crossings = detect_crossings(snapshot, &thresholds);
        let best = strongest(&crossings);

        let mut next = previous.clone();
        next.last_price = Some(snapshot.latest_price);

        let Some(crossing) = best else {
            return (
                AlertDecision {
                    asset: asset.symbol.clone(),
                    fires: false,
                    reason: REASON_QUIET.to_string(),
                    severity: Severity::None,
                    crossing: None,
                },
                next,
            );
        };

        if self.phase(previous, now) == AlertPhase::Cooldown {
            tracing::debug!(
                asset = %asset.symbol,
                suppressed = crossing.reason(),
                last_alert = %previous.last_alert_timestamp,
                "Crossing suppressed by cooldown"
            );
            return (
                AlertDecision {
                    asset: asset.symbol.clone(),
                    fires: false,
                    reason: REASON_COOLDOWN.to_string(),
                    severity: Severity::None,
                    crossing: Some(crossing),
                },
                next,
            );
        }

        let reason = crossing.reason().to_string();
        tracing::info!(
            asset = %asset.symbol,
            reason = %reason,
            value = crossing.value,
            threshold = crossing.threshold,
            "Alert fired"
        );

        next.last_alert_timestamp = now;
        next.last_status = reason.clone();

        (
            AlertDecision {
                asset: asset.symbol.clone(),
                fires: true,
                reason,
                severity: severity_for(crossing.ratio),
                crossing: Some(crossing),
            },
            next,
        )
    }
}
