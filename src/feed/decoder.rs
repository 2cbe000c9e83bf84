use serde::Deserialize;

use crate::error::DecodeError;
use crate::model::bar::Bar;

/// The only frame kind the feed acts on.
pub const BAR_TICK_KIND: &str = "kline.tick";

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    BarTick { interval: String, bar: Bar },
    /// A well-formed frame of a kind this client does not consume
    /// (heartbeats, trades, ...).
    Ignored { kind: String },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    interval: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Decode one text frame of the form `{ "type", "interval", "data" }`.
pub fn decode(raw: &str) -> Result<StreamEvent, DecodeError> {
    // Frames are JSON objects; going through a map keeps serde from
    // accepting the positional array form of `RawFrame`.
    let object: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(raw).map_err(DecodeError::Malformed)?;
    let frame: RawFrame = serde_json::from_value(serde_json::Value::Object(object))
        .map_err(DecodeError::Malformed)?;
    let kind = frame.kind.ok_or(DecodeError::MissingType)?;
    if kind != BAR_TICK_KIND {
        return Ok(StreamEvent::Ignored { kind });
    }

    let interval = frame.interval.ok_or_else(|| DecodeError::MissingField {
        kind: kind.clone(),
        field: "interval",
    })?;
    let data = frame.data.ok_or(DecodeError::MissingField {
        kind,
        field: "data",
    })?;
    let bar: Bar = serde_json::from_value(data).map_err(DecodeError::InvalidPayload)?;

    Ok(StreamEvent::BarTick { interval, bar })
}
