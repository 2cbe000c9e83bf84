use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::address::subscription_url;
use super::buffer::DEFAULT_CAPACITY;
use super::session::{CloseHandle, SessionConfig, Subscription, DEFAULT_RECONNECT_DELAY};
use super::transport::Connector;
use crate::config::FeedConfig;
use crate::error::FeedError;

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub base_url: String,
    pub feed_path: String,
    pub interval: Option<String>,
    pub reconnect_delay: Duration,
    pub buffer_capacity: usize,
}

impl FeedSettings {
    pub fn new(base_url: &str, feed_path: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            feed_path: feed_path.to_string(),
            interval: None,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            buffer_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl From<&FeedConfig> for FeedSettings {
    fn from(cfg: &FeedConfig) -> Self {
        Self {
            base_url: cfg.base_url.clone(),
            feed_path: cfg.feed_path.clone(),
            interval: cfg.interval.clone().filter(|i| !i.trim().is_empty()),
            reconnect_delay: Duration::from_millis(cfg.reconnect_delay_ms),
            buffer_capacity: cfg.buffer_capacity,
        }
    }
}

/// Opens market streams, keeping at most one live session per market id.
pub struct FeedClient {
    connector: Arc<dyn Connector>,
    settings: FeedSettings,
    sessions: HashMap<String, CloseHandle>,
}

impl FeedClient {
    pub fn new(connector: Arc<dyn Connector>, settings: FeedSettings) -> Self {
        Self {
            connector,
            settings,
            sessions: HashMap::new(),
        }
    }

    /// Open a stream for `market_id`, closing any session already open for it.
    ///
    /// A blank market id opens nothing and returns `Ok(None)`.
    pub fn open(
        &mut self,
        market_id: &str,
        token: Option<&str>,
    ) -> Result<Option<Subscription>, FeedError> {
        let market_id = market_id.trim();
        if market_id.is_empty() {
            tracing::debug!("No market selected, not opening a stream");
            return Ok(None);
        }

        let previous = self.sessions.remove(market_id);
        if let Some(previous) = &previous {
            if previous.close() {
                tracing::info!(market = %market_id, "Closed previous stream before reopening");
            }
        }

        let url = subscription_url(
            &self.settings.base_url,
            &self.settings.feed_path,
            market_id,
            token,
        )?;
        let subscription = Subscription::open_replacing(
            SessionConfig {
                market_id: market_id.to_string(),
                url,
                interval: self.settings.interval.clone(),
                reconnect_delay: self.settings.reconnect_delay,
                buffer_capacity: self.settings.buffer_capacity,
            },
            self.connector.clone(),
            previous,
        );
        self.sessions
            .insert(market_id.to_string(), subscription.close_handle());
        Ok(Some(subscription))
    }

    /// Close `subscription`; safe to call repeatedly.
    ///
    /// The market's handle stays on record, so a later [`FeedClient::open`]
    /// for it still waits until this transport has been released.
    pub fn close(&mut self, subscription: &Subscription) -> bool {
        subscription.close()
    }

    pub fn close_all(&mut self) {
        for handle in self.sessions.values() {
            handle.close();
        }
    }

    pub fn is_open(&self, market_id: &str) -> bool {
        self.sessions
            .get(market_id.trim())
            .is_some_and(|handle| !handle.is_closed())
    }
}
