// Plain-text reports: full snapshot and alerts-only
use crate::execution::{AssetOutcome, AssetResult};
use crate::models::Severity;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Default chunk size for outbound messages
pub const DEFAULT_MAX_CHARS: usize = 3500;

fn header(title: &str, now: DateTime<Utc>) -> String {
    format!("{} {}", title, now.format("%Y-%m-%d %H:%M UTC"))
}

/// More decimals for cheaper coins so small moves stay visible
fn format_price(price: f64) -> String {
    if price >= 1000.0 {
        format!("{:.2}", price)
    } else if price >= 1.0 {
        format!("{:.4}", price)
    } else {
        format!("{:.6}", price)
    }
}

fn format_pct(value: f64) -> String {
    format!("{:+.2}%", value)
}

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "🔴",
        Severity::Medium => "🟠",
        Severity::Low => "🟡",
        Severity::None => "⚪",
    }
}

/// One line per asset in configuration order
pub fn render_snapshot(results: &[AssetResult], now: DateTime<Utc>) -> String {
    let mut lines = vec![header("📈 Signal Snapshot", now), String::new()];

    for result in results {
        let name = result.asset.display_name();
        match &result.outcome {
            AssetOutcome::Evaluated {
                source,
                snapshot,
                decision,
                phase,
            } => {
                let trend = if snapshot.is_uptrend() { "↑" } else { "↓" };
                let icon = if decision.fires {
                    severity_icon(decision.severity)
                } else if snapshot.is_uptrend() {
                    "🟢"
                } else {
                    "🔻"
                };
                lines.push(format!(
                    "{} {}: {} | 5m {} | 15m {} | RSI {:.1} | EMA {} | ATR {:.2}% | {} | {}",
                    icon,
                    name,
                    format_price(snapshot.latest_price),
                    format_pct(snapshot.change_5m_pct),
                    format_pct(snapshot.change_15m_pct),
                    snapshot.rsi_14,
                    trend,
                    snapshot.atr_pct,
                    source,
                    phase.as_str(),
                ));
            }
            AssetOutcome::Unavailable { reason } => {
                lines.push(format!("⚠️ {}: unavailable ({})", name, reason));
            }
        }
    }

    lines.join("\n")
}

/// Firing assets only; `None` when nothing fired
pub fn render_alerts(results: &[AssetResult], now: DateTime<Utc>) -> Option<String> {
    let mut lines = Vec::new();

    for result in results {
        let AssetOutcome::Evaluated {
            source,
            snapshot,
            decision,
            ..
        } = &result.outcome
        else {
            continue;
        };
        if !decision.fires {
            continue;
        }

        lines.push(format!(
            "{} {} {}: {}",
            severity_icon(decision.severity),
            decision.severity.as_str().to_uppercase(),
            result.asset.display_name(),
            decision.reason,
        ));

        let detail = match &decision.crossing {
            Some(crossing) if crossing.indicator.is_rsi() => format!(
                "   RSI {:.1} vs {:.1}",
                crossing.value, crossing.threshold
            ),
            Some(crossing) => format!(
                "   {} vs threshold {:.2}%",
                format_pct(crossing.value),
                crossing.threshold
            ),
            None => String::from("  "),
        };
        lines.push(format!(
            "{} | price {} | {}",
            detail,
            format_price(snapshot.latest_price),
            source
        ));
    }

    if lines.is_empty() {
        return None;
    }

    let mut out = vec![header("🚨 Signal Alerts", now), String::new()];
    out.extend(lines);
    Some(out.join("\n"))
}

/// Split `text` into chunks of at most `max_chars` characters.
///
/// When more than one chunk results, each is prefixed with `Part i/n`.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let chunks: Vec<String> = chars
        .chunks(max_chars.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect();

    if chunks.len() == 1 {
        return chunks;
    }

    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| format!("Part {}/{}\n{}", i + 1, total, chunk))
        .collect()
}

/// Write both report files. The alerts file is emptied when nothing fired.
pub async fn write_reports(
    snapshot_path: &Path,
    alerts_path: &Path,
    snapshot: &str,
    alerts: Option<&str>,
) -> Result<()> {
    for path in [snapshot_path, alerts_path] {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
    }

    tokio::fs::write(snapshot_path, snapshot)
        .await
        .with_context(|| format!("Failed to write {}", snapshot_path.display()))?;
    tokio::fs::write(alerts_path, alerts.unwrap_or_default())
        .await
        .with_context(|| format!("Failed to write {}", alerts_path.display()))?;

    Ok(())
}
