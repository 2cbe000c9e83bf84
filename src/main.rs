use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{Event, KeyCode};
use market_pulse::config::Config;
use market_pulse::feed::client::{FeedClient, FeedSettings};
use market_pulse::feed::session::{EventReceiver, Subscription};
use market_pulse::feed::transport::SchemeConnector;
use market_pulse::ui::{self, FeedView};

struct ActiveFeed {
    subscription: Subscription,
    events: EventReceiver,
}

fn open_feed(client: &mut FeedClient, config: &Config, view: &mut FeedView) -> Option<ActiveFeed> {
    match client.open(&config.feed.market_id, config.feed.token.as_deref()) {
        Ok(Some(subscription)) => {
            let events = subscription.subscribe_events();
            view.reset(&subscription.snapshot());
            view.push_log(format!("Subscribed to market {}", subscription.market_id()));
            Some(ActiveFeed {
                subscription,
                events,
            })
        }
        Ok(None) => {
            view.push_log("[WARN] No market configured (feed.market_id / FEED_MARKET_ID)".to_string());
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to open market stream");
            view.push_log(format!("[ERR] {}", e));
            None
        }
    }
}

fn close_feed(client: &mut FeedClient, feed: Option<ActiveFeed>, view: &mut FeedView) {
    if let Some(feed) = feed {
        client.close(&feed.subscription);
        view.sync(&feed.subscription.snapshot());
        view.push_log(format!("Closed market {}", feed.subscription.market_id()));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required by rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Make sure config/default.toml exists and has a [feed] section");
            std::process::exit(1);
        }
    };

    // Log to file so it doesn't interfere with the TUI
    let log_file = std::fs::File::create("market-pulse.log").context("failed to create log file")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(config.logging.level.as_str())
            }),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .json()
        .init();

    tracing::info!(
        market = %config.feed.market_id,
        base_url = %config.feed.base_url,
        interval = ?config.feed.interval,
        authenticated = config.feed.token.is_some(),
        "Starting market-pulse"
    );

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("failed to build HTTP client")?;
    let mut client = FeedClient::new(
        SchemeConnector::shared(http),
        FeedSettings::from(&config.feed),
    );

    let interval_label = config.feed.interval.clone().unwrap_or_default();
    let mut view = FeedView::new(
        &config.feed.market_id,
        &interval_label,
        config.feed.buffer_capacity,
    );
    let mut feed = open_feed(&mut client, &config, &mut view);

    let mut terminal = ratatui::init();
    let result = run_loop(&mut terminal, &mut client, &config, &mut view, &mut feed);
    ratatui::restore();

    close_feed(&mut client, feed.take(), &mut view);
    client.close_all();
    tracing::info!("Shutdown complete");
    result
}

fn run_loop(
    terminal: &mut ratatui::DefaultTerminal,
    client: &mut FeedClient,
    config: &Config,
    view: &mut FeedView,
    feed: &mut Option<ActiveFeed>,
) -> Result<()> {
    loop {
        if let Some(active) = feed.as_mut() {
            while let Ok(event) = active.events.try_recv() {
                view.apply(event);
            }
            view.sync(&active.subscription.snapshot());
        }

        terminal.draw(|frame| ui::render(frame, view))?;

        if crossterm::event::poll(Duration::from_millis(config.ui.refresh_rate_ms))? {
            if let Event::Key(key) = crossterm::event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Char('Q') => {
                        tracing::info!("User quit");
                        return Ok(());
                    }
                    KeyCode::Char('r') | KeyCode::Char('R') => {
                        if let Some(active) = feed.as_ref() {
                            if active.subscription.reconnect() {
                                view.push_log("Reconnect requested".to_string());
                            }
                        }
                    }
                    KeyCode::Char('c') | KeyCode::Char('C') => {
                        close_feed(client, feed.take(), view);
                        *feed = open_feed(client, config, view);
                    }
                    _ => {}
                }
            }
        }
    }
}
