use chrono::DateTime;
use serde::Deserialize;

/// Deserialize a decimal that arrives as a string ("104.25") or a JSON number.
pub fn decimal<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    value_to_f64(&v).map_err(serde::de::Error::custom)
}

/// Like [`decimal`], but `null` becomes 0.
pub fn decimal_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    match v {
        serde_json::Value::Null => Ok(0.0),
        other => value_to_f64(&other).map_err(serde::de::Error::custom),
    }
}

/// Count that may arrive as a string or number; `null` becomes 0.
pub fn count_or_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    match v {
        serde_json::Value::Null => Ok(0),
        serde_json::Value::String(s) => s.trim().parse::<u64>().map_err(serde::de::Error::custom),
        serde_json::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom("count must be a non-negative integer")),
        _ => Err(serde::de::Error::custom("invalid count value")),
    }
}

/// Instant as epoch milliseconds. Accepts a number, a numeric string, or an
/// RFC 3339 timestamp.
pub fn epoch_ms<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    match v {
        serde_json::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom("timestamp must be a non-negative integer")),
        serde_json::Value::String(s) => parse_epoch_ms(&s).map_err(serde::de::Error::custom),
        _ => Err(serde::de::Error::custom("invalid timestamp value")),
    }
}

fn value_to_f64(v: &serde_json::Value) -> Result<f64, String> {
    let parsed = match v {
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid decimal '{}': {}", s, e)),
        serde_json::Value::Number(n) => n.as_f64().ok_or_else(|| "invalid number".to_string()),
        _ => Err("invalid numeric value".to_string()),
    }?;
    if !parsed.is_finite() {
        return Err(format!("non-finite decimal '{}'", v));
    }
    Ok(parsed)
}

pub fn parse_epoch_ms(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Ok(ms) = s.parse::<u64>() {
        return Ok(ms);
    }
    let dt = DateTime::parse_from_rfc3339(s).map_err(|e| format!("invalid timestamp '{}': {}", s, e))?;
    u64::try_from(dt.timestamp_millis()).map_err(|_| format!("timestamp '{}' is before epoch", s))
}
