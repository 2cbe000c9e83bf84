use crate::model::bar::Bar;

/// Latest traded price: the close of the most recent bar.
pub fn current_price(latest: Option<&Bar>) -> Option<f64> {
    latest.map(|bar| bar.close)
}

/// Percentage move from the open of the oldest buffered bar to the latest close.
///
/// `None` while fewer than two bars are buffered, when there is no latest bar,
/// or when the reference open is zero.
pub fn price_change_pct(bars: &[Bar], latest: Option<&Bar>) -> Option<f64> {
    if bars.len() < 2 {
        return None;
    }
    let latest = latest?;
    let reference = bars.first()?.open;
    if reference == 0.0 || !reference.is_finite() {
        return None;
    }
    Some((latest.close - reference) / reference * 100.0)
}
