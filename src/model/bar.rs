use serde::Deserialize;

use super::de;

/// One OHLCV interval of a market's kline stream.
///
/// `open_time` is the key within a market+interval stream. Prices are trusted
/// from upstream; `low <= min(open, close)` and `high >= max(open, close)` are
/// not checked here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    #[serde(deserialize_with = "de::epoch_ms")]
    pub open_time: u64,
    #[serde(deserialize_with = "de::epoch_ms")]
    pub close_time: u64,
    #[serde(deserialize_with = "de::decimal")]
    pub open: f64,
    #[serde(deserialize_with = "de::decimal")]
    pub high: f64,
    #[serde(deserialize_with = "de::decimal")]
    pub low: f64,
    #[serde(deserialize_with = "de::decimal")]
    pub close: f64,
    #[serde(default, alias = "volume", deserialize_with = "de::decimal_or_zero")]
    pub base_volume: f64,
    #[serde(default, deserialize_with = "de::decimal_or_zero")]
    pub quote_volume: f64,
    #[serde(default, alias = "trades", deserialize_with = "de::count_or_zero")]
    pub trades_count: u64,
    #[serde(default)]
    pub is_closed: bool,
}

impl Bar {
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}
