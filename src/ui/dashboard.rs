use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::event::ConnectionState;
use crate::model::bar::Bar;

pub struct PricePanel<'a> {
    price: Option<f64>,
    change_pct: Option<f64>,
    latest: Option<&'a Bar>,
    bar_count: usize,
}

impl<'a> PricePanel<'a> {
    pub fn new(
        price: Option<f64>,
        change_pct: Option<f64>,
        latest: Option<&'a Bar>,
        bar_count: usize,
    ) -> Self {
        Self {
            price,
            change_pct,
            latest,
            bar_count,
        }
    }
}

impl Widget for PricePanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let change_color = match self.change_pct {
            Some(v) if v > 0.0 => Color::Green,
            Some(v) if v < 0.0 => Color::Red,
            _ => Color::White,
        };
        let dash = || "---".to_string();

        let price_str = self.price.map(|p| format!("{:.4}", p)).unwrap_or_else(dash);
        let change_str = self
            .change_pct
            .map(|v| format!("{:+.2}%", v))
            .unwrap_or_else(dash);
        let volume_str = self
            .latest
            .map(|b| format!("{:.2}", b.base_volume))
            .unwrap_or_else(dash);
        let trades_str = self
            .latest
            .map(|b| b.trades_count.to_string())
            .unwrap_or_else(dash);
        let candle_str = match self.latest {
            Some(b) if b.is_closed => "closed",
            Some(_) => "live",
            None => "---",
        };

        let lines = vec![
            Line::from(vec![
                Span::styled("Price: ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    price_str,
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(vec![
                Span::styled("Chg:   ", Style::default().fg(Color::DarkGray)),
                Span::styled(change_str, Style::default().fg(change_color)),
            ]),
            Line::from(vec![
                Span::styled("Vol:   ", Style::default().fg(Color::DarkGray)),
                Span::styled(volume_str, Style::default().fg(Color::White)),
            ]),
            Line::from(vec![
                Span::styled("Trades:", Style::default().fg(Color::DarkGray)),
                Span::styled(format!(" {}", trades_str), Style::default().fg(Color::White)),
            ]),
            Line::from(vec![
                Span::styled("Candle:", Style::default().fg(Color::DarkGray)),
                Span::styled(format!(" {}", candle_str), Style::default().fg(Color::Cyan)),
            ]),
            Line::from(vec![
                Span::styled("Bars:  ", Style::default().fg(Color::DarkGray)),
                Span::styled(self.bar_count.to_string(), Style::default().fg(Color::White)),
            ]),
        ];

        let block = Block::default()
            .title(" Market ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));

        Paragraph::new(lines).block(block).render(area, buf);
    }
}

pub struct LogPanel<'a> {
    messages: &'a [String],
}

impl<'a> LogPanel<'a> {
    pub fn new(messages: &'a [String]) -> Self {
        Self { messages }
    }
}

impl Widget for LogPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Log ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        let visible = area.height.saturating_sub(2) as usize;
        let start = self.messages.len().saturating_sub(visible);

        let lines: Vec<Line> = self.messages[start..]
            .iter()
            .map(|msg| {
                let color = if msg.starts_with("[ERR]") {
                    Color::Red
                } else if msg.starts_with("[WARN]") {
                    Color::Yellow
                } else {
                    Color::Gray
                };
                Line::from(Span::styled(msg.as_str(), Style::default().fg(color)))
            })
            .collect();

        Paragraph::new(lines).block(block).render(area, buf);
    }
}

pub struct StatusBar<'a> {
    pub market_id: &'a str,
    pub interval: &'a str,
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub bar_events: u64,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let conn_color = match self.state {
            ConnectionState::Connected => Color::Green,
            ConnectionState::Connecting => Color::Yellow,
            ConnectionState::Idle => Color::DarkGray,
            ConnectionState::Disconnected | ConnectionState::ErroredPendingRetry => Color::Red,
        };
        let mut conn_label = self.state.label().to_string();
        if self.state == ConnectionState::ErroredPendingRetry {
            conn_label.push_str(&format!(" (retry #{})", self.reconnect_attempts));
        }

        let market = if self.market_id.is_empty() {
            "no market"
        } else {
            self.market_id
        };

        let line = Line::from(vec![
            Span::styled(
                " market-pulse ",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("| ", Style::default().fg(Color::DarkGray)),
            Span::styled(market, Style::default().fg(Color::Cyan)),
            Span::styled(" | ", Style::default().fg(Color::DarkGray)),
            Span::styled(self.interval, Style::default().fg(Color::Cyan)),
            Span::styled(" | ", Style::default().fg(Color::DarkGray)),
            Span::styled(conn_label, Style::default().fg(conn_color)),
            Span::styled(" | ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("ticks: {}", self.bar_events),
                Style::default().fg(Color::DarkGray),
            ),
        ]);

        buf.set_line(area.x, area.y, &line, area.width);
    }
}

pub struct KeybindBar;

impl Widget for KeybindBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let line = Line::from(vec![
            Span::styled(" [Q]", Style::default().fg(Color::Yellow)),
            Span::styled("uit  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[R]", Style::default().fg(Color::Yellow)),
            Span::styled("econnect  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[C]", Style::default().fg(Color::Yellow)),
            Span::styled("lose & reopen  ", Style::default().fg(Color::DarkGray)),
        ]);

        buf.set_line(area.x, area.y, &line, area.width);
    }
}
