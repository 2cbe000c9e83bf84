use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream};
use futures_util::{FutureExt, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio_tungstenite::tungstenite;
use url::Url;

use crate::error::FeedError;

/// Text frames pushed by the server. The stream ending means the server went away.
pub type FrameStream = BoxStream<'static, Result<String, FeedError>>;

/// Opens a live connection for a subscription address.
///
/// Dropping the returned stream releases the underlying connection.
pub trait Connector: Send + Sync {
    fn connect(&self, url: Url) -> BoxFuture<'static, Result<FrameStream, FeedError>>;
}

/// Longest line accepted from an event stream.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Incremental parser for `text/event-stream` bodies.
///
/// Bytes may be split anywhere, including inside a UTF-8 sequence. Only `data`
/// fields are kept; one event is dispatched per blank line.
#[derive(Debug, Default)]
pub struct SseParser {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the events completed by it.
    ///
    /// Fails once an unterminated line grows past [`MAX_LINE_BYTES`].
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>, FeedError> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        if self.pending.len() > MAX_LINE_BYTES {
            self.pending.clear();
            self.data.clear();
            return Err(FeedError::Transport(format!(
                "event-stream line exceeds {} bytes",
                MAX_LINE_BYTES
            )));
        }
        Ok(events)
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            let event = self.data.join("\n");
            self.data.clear();
            return Some(event);
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        // event / id / retry are not used by the feed.
        None
    }
}

/// Server-sent events over HTTP(S).
#[derive(Clone)]
pub struct SseConnector {
    http: reqwest::Client,
}

impl SseConnector {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Connector for SseConnector {
    fn connect(&self, url: Url) -> BoxFuture<'static, Result<FrameStream, FeedError>> {
        let http = self.http.clone();
        async move {
            let resp = http
                .get(url)
                .header(ACCEPT, "text/event-stream")
                .header(CACHE_CONTROL, "no-cache")
                .send()
                .await?
                .error_for_status()?;

            let mut parser = SseParser::new();
            let frames = resp
                .bytes_stream()
                .map(move |chunk| match chunk {
                    Ok(bytes) => match parser.feed(&bytes) {
                        Ok(events) => events.into_iter().map(Ok).collect::<Vec<_>>(),
                        Err(e) => vec![Err(e)],
                    },
                    Err(e) => vec![Err(FeedError::Http(e))],
                })
                .flat_map(stream::iter);
            Ok(frames.boxed())
        }
        .boxed()
    }
}

/// WebSocket transport. Text messages are frames; control and binary
/// messages are skipped.
#[derive(Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WsConnector {
    fn connect(&self, url: Url) -> BoxFuture<'static, Result<FrameStream, FeedError>> {
        async move {
            let (ws_stream, _resp) = tokio_tungstenite::connect_async(url.as_str()).await?;
            let (_write, read) = ws_stream.split();
            let frames = read.filter_map(|msg| async move {
                match msg {
                    Ok(tungstenite::Message::Text(text)) => Some(Ok(text)),
                    // tokio-tungstenite answers pings itself
                    Ok(_) => None,
                    Err(e) => Some(Err(FeedError::WebSocket(e))),
                }
            });
            Ok(frames.boxed())
        }
        .boxed()
    }
}

/// Picks the transport from the address scheme: `http(s)` is SSE, `ws(s)` is
/// WebSocket.
#[derive(Clone)]
pub struct SchemeConnector {
    sse: SseConnector,
    ws: WsConnector,
}

impl SchemeConnector {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            sse: SseConnector::new(http),
            ws: WsConnector::new(),
        }
    }

    pub fn shared(http: reqwest::Client) -> Arc<dyn Connector> {
        Arc::new(Self::new(http))
    }
}

impl Connector for SchemeConnector {
    fn connect(&self, url: Url) -> BoxFuture<'static, Result<FrameStream, FeedError>> {
        match url.scheme() {
            "http" | "https" => self.sse.connect(url),
            "ws" | "wss" => self.ws.connect(url),
            other => {
                let err = FeedError::Config(format!("unsupported stream scheme '{}'", other));
                async move { Err(err) }.boxed()
            }
        }
    }
}
