mod support;

use std::time::Duration;

use tokio_test::assert_ok;

use market_pulse::event::ConnectionState;
use market_pulse::feed::client::{FeedClient, FeedSettings};

use support::{wait_for_state, ScriptedConnector};

fn settings() -> FeedSettings {
    FeedSettings::new("https://api.example.com", "stream")
}

#[tokio::test(start_paused = true)]
async fn blank_market_id_opens_nothing() {
    let connector = ScriptedConnector::new(vec![]);
    let mut client = FeedClient::new(connector.clone(), settings());

    assert!(client.open("", None).unwrap().is_none());
    assert!(client.open("   ", Some("tok")).unwrap().is_none());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(connector.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn open_uses_market_address_and_token() {
    let connector = ScriptedConnector::new(vec![]);
    let mut client = FeedClient::new(connector.clone(), settings());

    let sub = assert_ok!(client.open("42", Some("secret"))).unwrap();
    let mut snapshots = sub.watch();
    wait_for_state(&mut snapshots, ConnectionState::Connected).await;

    let urls = connector.urls();
    assert_eq!(urls.len(), 1);
    assert_eq!(
        urls[0].as_str(),
        "https://api.example.com/stream/markets/42?token=secret"
    );
    assert!(client.is_open("42"));
}

#[tokio::test(start_paused = true)]
async fn reopening_same_market_closes_previous_session() {
    let connector = ScriptedConnector::new(vec![]);
    let mut client = FeedClient::new(connector.clone(), settings());

    let first = client.open("42", None).unwrap().unwrap();
    let mut first_snapshots = first.watch();
    wait_for_state(&mut first_snapshots, ConnectionState::Connected).await;

    let second = client.open("42", None).unwrap().unwrap();
    assert!(first.is_closed());
    assert!(!second.is_closed());

    let mut second_snapshots = second.watch();
    wait_for_state(&mut second_snapshots, ConnectionState::Connected).await;
    // Only the second session still holds a transport.
    assert_eq!(connector.open_streams(), 1);
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn different_markets_run_side_by_side() {
    let connector = ScriptedConnector::new(vec![]);
    let mut client = FeedClient::new(connector.clone(), settings());

    let a = client.open("1", None).unwrap().unwrap();
    let b = client.open("2", None).unwrap().unwrap();
    wait_for_state(&mut a.watch(), ConnectionState::Connected).await;
    wait_for_state(&mut b.watch(), ConnectionState::Connected).await;
    assert_eq!(connector.open_streams(), 2);

    client.close_all();
    assert!(a.is_closed());
    assert!(b.is_closed());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(connector.open_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn close_is_safe_to_repeat() {
    let connector = ScriptedConnector::new(vec![]);
    let mut client = FeedClient::new(connector.clone(), settings());

    let sub = client.open("42", None).unwrap().unwrap();
    assert!(client.close(&sub));
    assert!(!client.close(&sub));
    assert!(!client.is_open("42"));

    // A closed-then-reopened market is a fresh, independent session.
    let again = client.open("42", None).unwrap().unwrap();
    assert!(!again.is_closed());
    assert!(again.snapshot().bars.is_empty());
}

#[tokio::test]
async fn stale_handle_does_not_close_newer_session() {
    let connector = ScriptedConnector::new(vec![]);
    let mut client = FeedClient::new(connector.clone(), settings());

    let old = client.open("42", None).unwrap().unwrap();
    let new = client.open("42", None).unwrap().unwrap();
    assert!(!client.close(&old));
    assert!(client.is_open("42"));
    assert!(!new.is_closed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reopening_never_overlaps_transports() {
    let connector = ScriptedConnector::new(vec![]);
    let mut client = FeedClient::new(connector.clone(), settings());

    let mut sessions = Vec::new();
    for _ in 0..200 {
        let sub = client.open("42", None).unwrap().unwrap();
        wait_for_state(&mut sub.watch(), ConnectionState::Connected).await;
        assert_eq!(connector.open_streams(), 1);
        sessions.push(sub);
    }

    assert_eq!(connector.attempts(), 200);
    assert_eq!(connector.peak_open_streams(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn close_then_open_waits_for_release() {
    let connector = ScriptedConnector::new(vec![]);
    let mut client = FeedClient::new(connector.clone(), settings());

    for _ in 0..100 {
        let sub = client.open("42", None).unwrap().unwrap();
        wait_for_state(&mut sub.watch(), ConnectionState::Connected).await;
        client.close(&sub);
    }

    assert_eq!(connector.peak_open_streams(), 1);
}
