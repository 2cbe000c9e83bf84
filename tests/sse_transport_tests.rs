use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

use market_pulse::feed::transport::{Connector, SchemeConnector, SseConnector};

/// Serve one HTTP response on a local port and return its base URL.
async fn serve_once(response: &'static str) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = vec![0u8; 4096];
        let _ = socket.read(&mut request).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });
    Url::parse(&format!("http://{}/stream/markets/42", addr)).unwrap()
}

#[tokio::test]
async fn sse_connector_yields_data_frames_then_ends() {
    let url = serve_once(concat!(
        "HTTP/1.1 200 OK\r\n",
        "Content-Type: text/event-stream\r\n",
        "Connection: close\r\n",
        "\r\n",
        ": hello\n\n",
        "data: {\"type\":\"heartbeat\"}\n\n",
        "event: message\n",
        "data: {\"type\":\"kline.tick\",\n",
        "data: \"interval\":\"1m\"}\n\n",
    ))
    .await;

    let connector = SseConnector::new(reqwest::Client::new());
    let frames: Vec<String> = connector
        .connect(url)
        .await
        .unwrap()
        .map(|f| f.unwrap())
        .collect()
        .await;

    assert_eq!(
        frames,
        vec![
            "{\"type\":\"heartbeat\"}".to_string(),
            "{\"type\":\"kline.tick\",\n\"interval\":\"1m\"}".to_string(),
        ]
    );
}

#[tokio::test]
async fn sse_connector_rejects_error_status() {
    let url = serve_once(concat!(
        "HTTP/1.1 401 Unauthorized\r\n",
        "Content-Length: 0\r\n",
        "Connection: close\r\n",
        "\r\n",
    ))
    .await;

    let connector = SchemeConnector::new(reqwest::Client::new());
    let err = connector.connect(url).await.err().unwrap();
    assert!(err.is_transport());
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let connector = SseConnector::new(reqwest::Client::new());
    let url = Url::parse(&format!("http://{}/stream/markets/1", addr)).unwrap();
    let err = connector.connect(url).await.err().unwrap();
    assert!(err.is_transport());
}
