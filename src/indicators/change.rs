/// Percentage change between the latest price and the price `window` samples ago
///
/// `(latest - base) / base * 100`. Returns 0.0 when the base price is zero,
/// None when there are not `window + 1` samples.
pub fn pct_change(prices: &[f64], window: usize) -> Option<f64> {
    if prices.len() < window + 1 {
        return None;
    }

    let latest = *prices.last()?;
    let base = prices[prices.len() - 1 - window];

    if base == 0.0 {
        return Some(0.0);
    }

    Some((latest - base) / base * 100.0)
}
