pub mod chart;
pub mod dashboard;

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Frame;

use crate::event::{ConnectionState, SessionEvent, SessionSnapshot};
use crate::feed::metrics::{current_price, price_change_pct};
use crate::model::bar::Bar;

use chart::{CandleChart, ChartSeries};
use dashboard::{KeybindBar, LogPanel, PricePanel, StatusBar};

const MAX_LOG_MESSAGES: usize = 200;

/// Host-side view of one market stream: what the terminal draws.
pub struct FeedView {
    pub market_id: String,
    pub interval: String,
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub bars: Vec<Bar>,
    pub latest: Option<Bar>,
    pub last_error: Option<String>,
    pub chart: ChartSeries,
    pub bar_events: u64,
    pub log_messages: Vec<String>,
}

impl FeedView {
    pub fn new(market_id: &str, interval: &str, capacity: usize) -> Self {
        Self {
            market_id: market_id.to_string(),
            interval: interval.to_string(),
            state: ConnectionState::Idle,
            reconnect_attempts: 0,
            bars: Vec::new(),
            latest: None,
            last_error: None,
            chart: ChartSeries::new(capacity),
            bar_events: 0,
            log_messages: Vec::new(),
        }
    }

    pub fn current_price(&self) -> Option<f64> {
        current_price(self.latest.as_ref())
    }

    pub fn price_change_pct(&self) -> Option<f64> {
        price_change_pct(&self.bars, self.latest.as_ref())
    }

    pub fn push_log(&mut self, msg: String) {
        self.log_messages.push(msg);
        if self.log_messages.len() > MAX_LOG_MESSAGES {
            self.log_messages.remove(0);
        }
    }

    /// Start over from a session snapshot; the chart is replaced wholesale.
    pub fn reset(&mut self, snapshot: &SessionSnapshot) {
        self.market_id = snapshot.market_id.clone();
        self.sync(snapshot);
        self.chart.set_data(&snapshot.bars);
    }

    /// Refresh displayed values from the latest snapshot.
    pub fn sync(&mut self, snapshot: &SessionSnapshot) {
        self.state = snapshot.state;
        self.reconnect_attempts = snapshot.reconnect_attempts;
        self.bars.clone_from(&snapshot.bars);
        self.latest.clone_from(&snapshot.latest);
        self.last_error.clone_from(&snapshot.last_error);
    }

    pub fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Bar(bar) => {
                self.bar_events += 1;
                self.chart.update(&bar);
            }
            SessionEvent::State(state) => {
                self.state = state;
                match state {
                    ConnectionState::Connected => self.push_log("Stream connected".to_string()),
                    ConnectionState::ErroredPendingRetry => {
                        self.push_log("[WARN] Stream lost, retrying".to_string())
                    }
                    ConnectionState::Connecting => {
                        self.push_log(format!("Connecting to market {}", self.market_id))
                    }
                    ConnectionState::Idle | ConnectionState::Disconnected => {}
                }
            }
            SessionEvent::Error(msg) => {
                self.push_log(format!("[ERR] {}", msg));
                self.last_error = Some(msg);
            }
        }
    }
}

pub fn render(frame: &mut Frame, view: &FeedView) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // status bar
            Constraint::Min(10),   // chart + market panel
            Constraint::Length(6), // log
            Constraint::Length(1), // keybinds
        ])
        .split(frame.area());

    frame.render_widget(
        StatusBar {
            market_id: &view.market_id,
            interval: &view.interval,
            state: view.state,
            reconnect_attempts: view.reconnect_attempts,
            bar_events: view.bar_events,
        },
        outer[0],
    );

    let main_area = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(40), Constraint::Length(24)])
        .split(outer[1]);

    let title = format!("Market {} ({})", view.market_id, view.interval);
    frame.render_widget(CandleChart::new(&view.chart, &title), main_area[0]);
    frame.render_widget(
        PricePanel::new(
            view.current_price(),
            view.price_change_pct(),
            view.latest.as_ref(),
            view.bars.len(),
        ),
        main_area[1],
    );

    frame.render_widget(LogPanel::new(&view.log_messages), outer[2]);
    frame.render_widget(KeybindBar, outer[3]);
}
