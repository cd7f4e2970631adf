/// Calculate Relative Strength Index (RSI) with Wilder's smoothing
///
/// The first average gain/loss is the simple mean of the first `period`
/// close-to-close changes. Every later change is folded in with
/// `avg = (avg * (period - 1) + x) / period`.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
/// Returns 100 when the average loss is zero (no down moves in the window).
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let mut gains = Vec::with_capacity(prices.len() - 1);
    let mut losses = Vec::with_capacity(prices.len() - 1);

    // Calculate price changes
    for i in 1..prices.len() {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(change.abs());
        }
    }

    let n = period as f64;
    let mut avg_gain: f64 = gains.iter().take(period).sum::<f64>() / n;
    let mut avg_loss: f64 = losses.iter().take(period).sum::<f64>() / n;

    for i in period..gains.len() {
        avg_gain = (avg_gain * (n - 1.0) + gains[i]) / n;
        avg_loss = (avg_loss * (n - 1.0) + losses[i]) / n;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    let rsi = 100.0 - (100.0 / (1.0 + rs));

    Some(rsi)
}
