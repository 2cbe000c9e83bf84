#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::{self, StreamExt};
use futures_util::FutureExt;
use tokio::sync::{mpsc, watch};
use url::Url;

use market_pulse::error::FeedError;
use market_pulse::event::{ConnectionState, SessionEvent, SessionSnapshot};
use market_pulse::feed::session::{EventReceiver, SessionConfig};
use market_pulse::feed::transport::{Connector, FrameStream};
use market_pulse::model::bar::Bar;

pub fn bar(open_time: u64, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        open_time,
        close_time: open_time + 59_999,
        open,
        high,
        low,
        close,
        base_volume: 1.5,
        quote_volume: 1.5 * close,
        trades_count: 7,
        is_closed: false,
    }
}

/// Bar opening at minute `i` with a close of `100 + i`.
pub fn minute_bar(i: u64) -> Bar {
    let close = 100.0 + i as f64;
    bar(i * 60_000, 100.0, close + 1.0, 99.0, close)
}

pub fn tick_frame(interval: &str, bar: &Bar) -> String {
    serde_json::json!({
        "type": "kline.tick",
        "interval": interval,
        "data": {
            "openTime": bar.open_time,
            "closeTime": bar.close_time,
            "open": bar.open.to_string(),
            "high": bar.high.to_string(),
            "low": bar.low.to_string(),
            "close": bar.close.to_string(),
            "baseVolume": bar.base_volume.to_string(),
            "quoteVolume": bar.quote_volume.to_string(),
            "tradesCount": bar.trades_count,
            "isClosed": bar.is_closed,
        }
    })
    .to_string()
}

pub fn session_config(market_id: &str) -> SessionConfig {
    SessionConfig {
        market_id: market_id.to_string(),
        url: Url::parse(&format!("https://feed.test/stream/markets/{}", market_id)).unwrap(),
        interval: None,
        reconnect_delay: Duration::from_millis(3_000),
        buffer_capacity: 100,
    }
}

/// What the next `connect` call does.
pub enum Script {
    /// The connection attempt itself fails.
    Refuse(String),
    /// The connection attempt fails with an error that is not worth retrying.
    Reject(String),
    /// Deliver the frames, then fail the transport.
    Fail(Vec<String>, String),
    /// Deliver the frames, then stay open forever.
    Hold(Vec<String>),
    /// Deliver frames pushed by the test; ends when the sender is dropped.
    Live(mpsc::UnboundedReceiver<String>),
}

struct OpenGuard(Arc<AtomicUsize>);

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Connector double that plays back scripts in order. Once the scripts run
/// out every connection stays open and silent.
pub struct ScriptedConnector {
    scripts: Mutex<VecDeque<Script>>,
    attempts: AtomicUsize,
    open: Arc<AtomicUsize>,
    peak: AtomicUsize,
    urls: Mutex<Vec<Url>>,
}

impl ScriptedConnector {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            attempts: AtomicUsize::new(0),
            open: Arc::new(AtomicUsize::new(0)),
            peak: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Streams handed out and not yet dropped.
    pub fn open_streams(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Most streams that were ever open at the same time.
    pub fn peak_open_streams(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<Url> {
        self.urls.lock().unwrap().clone()
    }

    fn track(&self, frames: FrameStream) -> FrameStream {
        let now_open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_open, Ordering::SeqCst);
        let guard = OpenGuard(self.open.clone());
        frames
            .map(move |item| {
                let _ = &guard;
                item
            })
            .boxed()
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, url: Url) -> BoxFuture<'static, Result<FrameStream, FeedError>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url);
        let script = self.scripts.lock().unwrap().pop_front();
        let result = match script {
            None => Ok(self.track(stream::pending().boxed())),
            Some(Script::Refuse(msg)) => Err(FeedError::Transport(msg)),
            Some(Script::Reject(msg)) => Err(FeedError::Config(msg)),
            Some(Script::Fail(frames, msg)) => Ok(self.track(
                stream::iter(frames.into_iter().map(Ok))
                    .chain(stream::once(async move { Err(FeedError::Transport(msg)) }))
                    .boxed(),
            )),
            Some(Script::Hold(frames)) => Ok(self.track(
                stream::iter(frames.into_iter().map(Ok))
                    .chain(stream::pending())
                    .boxed(),
            )),
            Some(Script::Live(rx)) => Ok(self.track(
                stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|frame| (Ok(frame), rx))
                })
                .boxed(),
            )),
        };
        futures_util::future::ready(result).boxed()
    }
}

pub async fn wait_for(
    rx: &mut watch::Receiver<SessionSnapshot>,
    condition: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    tokio::time::timeout(Duration::from_secs(60), rx.wait_for(condition))
        .await
        .expect("timed out waiting for session snapshot")
        .expect("session snapshot channel closed")
        .clone()
}

pub async fn wait_for_state(
    rx: &mut watch::Receiver<SessionSnapshot>,
    state: ConnectionState,
) -> SessionSnapshot {
    wait_for(rx, |s| s.state == state).await
}

pub async fn next_bar(events: &mut EventReceiver) -> Bar {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(60), events.recv())
            .await
            .expect("timed out waiting for a bar event")
            .expect("event channel closed");
        if let SessionEvent::Bar(bar) = event {
            return bar;
        }
    }
}

pub fn drain(events: &mut EventReceiver) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
