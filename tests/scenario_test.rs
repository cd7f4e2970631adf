mod common;

use chrono::Duration;
use signalbot::indicators::compute;
use signalbot::models::{Asset, AssetState, Severity};
use signalbot::strategy::{AlertPhase, DecisionEngine, Thresholds};

fn btc() -> Asset {
    Asset {
        symbol: "BTC".to_string(),
        name: Some("Bitcoin".to_string()),
        symbols: Default::default(),
        thresholds: Default::default(),
    }
}

#[test]
fn test_btc_breakout_then_cooldown() {
    let engine = DecisionEngine::new(Thresholds::default(), Duration::minutes(30));

    // 1. +3% over 5 minutes in a calm market, no prior alert
    let first = compute(&common::series("BTC", &common::breakout_closes())).unwrap();
    assert!((first.change_5m_pct - 3.0).abs() < 1e-6);
    assert!(first.rsi_14 < 70.0, "rsi {}", first.rsi_14);
    assert!(first.atr_pct < 0.5, "atr% {}", first.atr_pct);

    let t0 = first.as_of;
    let (decision, state) = engine.decide(&btc(), &first, &AssetState::default(), t0);

    assert!(decision.fires);
    assert_eq!(decision.reason, "5m breakout");
    assert_eq!(decision.severity, Severity::Low);
    assert_eq!(state.last_alert_timestamp, t0);
    assert_eq!(state.last_status, "5m breakout");
    assert_eq!(state.last_price, Some(first.latest_price));

    // 2. Ten minutes later, another +3%, still inside the 30 minute cooldown
    let second = compute(&common::series("BTC", &common::second_breakout_closes())).unwrap();
    assert!(second.change_5m_pct >= 3.0 - 1e-6);

    let t1 = t0 + Duration::minutes(10);
    assert_eq!(second.as_of, t1);
    assert_eq!(engine.phase(&state, t1), AlertPhase::Cooldown);

    let (decision, next) = engine.decide(&btc(), &second, &state, t1);

    assert!(!decision.fires);
    assert_eq!(decision.reason, "cooldown active");
    assert_eq!(decision.severity, Severity::None);
    assert_eq!(next.last_alert_timestamp, t0);
    assert_eq!(next.last_status, "5m breakout");
    assert_eq!(next.last_price, Some(second.latest_price));

    // 3. Once the window has elapsed the same move fires again
    let t2 = t0 + Duration::minutes(30);
    let (decision, _) = engine.decide(&btc(), &second, &next, t2);
    assert!(decision.fires);
}

#[test]
fn test_volatile_market_raises_the_bar() {
    let snapshot = compute(&common::series("BTC", &common::breakout_closes())).unwrap();

    // K small enough that ATR% doubles the effective 5m threshold
    let thresholds = Thresholds {
        atr_scale_k: snapshot.atr_pct,
        ..Thresholds::default()
    };
    let engine = DecisionEngine::new(thresholds, Duration::minutes(30));

    let (decision, state) = engine.decide(&btc(), &snapshot, &AssetState::default(), snapshot.as_of);

    assert!(!decision.fires);
    assert_eq!(decision.reason, "within thresholds");
    assert!(!state.has_alerted());
}
