use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub base_url: String,
    #[serde(default = "default_feed_path")]
    pub feed_path: String,
    /// Market to stream; blank means nothing is opened.
    #[serde(default)]
    pub market_id: String,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    #[serde(skip)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    pub refresh_rate_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            refresh_rate_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn default_feed_path() -> String {
    "stream".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    3_000
}

fn default_buffer_capacity() -> usize {
    100
}

/// Parse a kline interval label (e.g. "1s", "1m", "1h", "1d", "1w", "1M") into milliseconds.
pub fn parse_interval_ms(s: &str) -> Result<u64> {
    let split = match s.char_indices().last() {
        Some((idx, _)) if idx > 0 => idx,
        _ => bail!("invalid interval '{}': expected format like '1m'", s),
    };

    let (num_str, suffix) = s.split_at(split);
    let n: u64 = num_str.parse().with_context(|| {
        format!(
            "invalid interval '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid interval '{}': quantity must be > 0", s);
    }

    let unit_ms = match suffix {
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "w" => 7 * 86_400_000,
        "M" => 30 * 86_400_000,
        _ => bail!(
            "invalid interval '{}': unsupported suffix '{}', expected one of s/m/h/d/w/M",
            s,
            suffix
        ),
    };

    n.checked_mul(unit_ms)
        .with_context(|| format!("invalid interval '{}': value is too large", s))
}

impl FeedConfig {
    pub fn interval_ms(&self) -> Result<Option<u64>> {
        match self.interval.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => parse_interval_ms(label).map(Some),
            _ => Ok(None),
        }
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(self.base_url.trim())
            .with_context(|| format!("feed.base_url '{}' is not a valid URL", self.base_url))?;
        if self.buffer_capacity == 0 {
            bail!("feed.buffer_capacity must be > 0");
        }
        self.interval_ms().context("feed.interval is invalid")?;
        Ok(())
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH))
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let mut config = Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;
        config.apply_env_overrides(
            std::env::var("FEED_TOKEN").ok(),
            std::env::var("FEED_MARKET_ID").ok(),
        );
        Ok(config)
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("invalid config TOML")?;
        config.feed.validate()?;
        Ok(config)
    }

    /// Apply `FEED_TOKEN` / `FEED_MARKET_ID`. Blank values are ignored.
    pub fn apply_env_overrides(&mut self, token: Option<String>, market_id: Option<String>) {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.feed.token = Some(token.trim().to_string());
        }
        if let Some(market_id) = market_id.filter(|m| !m.trim().is_empty()) {
            self.feed.market_id = market_id.trim().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_interval_valid() {
        assert_eq!(parse_interval_ms("1m").unwrap(), 60_000);
        assert_eq!(parse_interval_ms("2h").unwrap(), 7_200_000);
        assert_eq!(parse_interval_ms("1M").unwrap(), 2_592_000_000);
    }

    #[test]
    fn parse_interval_rejects_invalid_inputs() {
        assert!(parse_interval_ms("").is_err());
        assert!(parse_interval_ms("m").is_err());
        assert!(parse_interval_ms("0m").is_err());
        assert!(parse_interval_ms("1x").is_err());
        assert!(parse_interval_ms("1é").is_err());
        assert!(parse_interval_ms("é").is_err());
    }
}
