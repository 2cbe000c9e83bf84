use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Widget},
};

use crate::model::bar::Bar;

/// Below this many points the whole series is fitted on screen.
pub const FIT_ALL_BELOW: usize = 20;
/// Points kept visible once the series is long enough to scroll.
pub const VISIBLE_BARS: usize = 50;
/// Empty slots left right of the newest point while scrolling.
pub const RIGHT_PADDING_BARS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibleWindow {
    pub start: usize,
    pub end: usize,
    pub right_padding: usize,
}

impl VisibleWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Horizontal slots the window occupies, padding included.
    pub fn slots(&self) -> usize {
        self.len() + self.right_padding
    }
}

pub fn visible_window(len: usize) -> VisibleWindow {
    if len < FIT_ALL_BELOW {
        return VisibleWindow {
            start: 0,
            end: len,
            right_padding: 0,
        };
    }
    VisibleWindow {
        start: len.saturating_sub(VISIBLE_BARS),
        end: len,
        right_padding: RIGHT_PADDING_BARS,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandlePoint {
    pub time: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl CandlePoint {
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

impl From<&Bar> for CandlePoint {
    fn from(bar: &Bar) -> Self {
        Self {
            time: bar.open_time,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumePoint {
    pub time: u64,
    pub value: f64,
    pub rising: bool,
}

impl From<&Bar> for VolumePoint {
    fn from(bar: &Bar) -> Self {
        Self {
            time: bar.open_time,
            value: bar.base_volume,
            rising: bar.is_bullish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesUpdate {
    Amended,
    Appended,
    /// Older than the last rendered point.
    Ignored,
}

/// Candle and volume series as drawn, plus the current visible window.
///
/// Holds render points only; market data stays with the feed session.
#[derive(Debug, Clone)]
pub struct ChartSeries {
    candles: Vec<CandlePoint>,
    volumes: Vec<VolumePoint>,
    window: VisibleWindow,
    max_points: usize,
}

impl ChartSeries {
    pub fn new(max_points: usize) -> Self {
        Self {
            candles: Vec::new(),
            volumes: Vec::new(),
            window: VisibleWindow::default(),
            max_points: max_points.max(1),
        }
    }

    /// Replace both series wholesale.
    pub fn set_data(&mut self, bars: &[Bar]) {
        let skip = bars.len().saturating_sub(self.max_points);
        self.candles = bars[skip..].iter().map(CandlePoint::from).collect();
        self.volumes = bars[skip..].iter().map(VolumePoint::from).collect();
        self.refit();
    }

    /// Amend the last point, or append when `bar` is newer.
    pub fn update(&mut self, bar: &Bar) -> SeriesUpdate {
        match self.candles.last().map(|c| c.time) {
            Some(last) if last == bar.open_time => {
                if let Some(candle) = self.candles.last_mut() {
                    *candle = CandlePoint::from(bar);
                }
                if let Some(volume) = self.volumes.last_mut() {
                    *volume = VolumePoint::from(bar);
                }
                SeriesUpdate::Amended
            }
            Some(last) if bar.open_time < last => SeriesUpdate::Ignored,
            _ => {
                self.candles.push(CandlePoint::from(bar));
                self.volumes.push(VolumePoint::from(bar));
                if self.candles.len() > self.max_points {
                    let excess = self.candles.len() - self.max_points;
                    self.candles.drain(..excess);
                    self.volumes.drain(..excess);
                }
                self.refit();
                SeriesUpdate::Appended
            }
        }
    }

    pub fn clear(&mut self) {
        self.candles.clear();
        self.volumes.clear();
        self.refit();
    }

    fn refit(&mut self) {
        self.window = visible_window(self.candles.len());
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn window(&self) -> VisibleWindow {
        self.window
    }

    pub fn candles(&self) -> &[CandlePoint] {
        &self.candles
    }

    pub fn visible_candles(&self) -> &[CandlePoint] {
        &self.candles[self.window.start..self.window.end]
    }

    pub fn visible_volumes(&self) -> &[VolumePoint] {
        &self.volumes[self.window.start..self.window.end]
    }
}

pub struct CandleChart<'a> {
    series: &'a ChartSeries,
    title: &'a str,
}

impl<'a> CandleChart<'a> {
    pub fn new(series: &'a ChartSeries, title: &'a str) -> Self {
        Self { series, title }
    }
}

impl Widget for CandleChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = format!(" {} ", self.title);
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        let inner = block.inner(area);
        block.render(area, buf);

        let window = self.series.window();
        if window.is_empty() || inner.height < 6 || inner.width < 8 {
            return;
        }

        let volume_rows = (inner.height / 4).max(2);
        let price_rows = inner.height - volume_rows;
        let width = inner.width as usize;

        // Keep the padding; drop the oldest points if the terminal is narrow.
        let padding = window.right_padding.min(width / 4);
        let capacity = width.saturating_sub(padding).max(1);
        let slots = (window.len() + padding).max(1);
        let col_width = (width / slots).max(1);
        let shown = window.len().min(capacity / col_width);
        if shown == 0 {
            return;
        }

        let candles = self.series.visible_candles();
        let volumes = self.series.visible_volumes();
        let candles = &candles[candles.len() - shown..];
        let volumes = &volumes[volumes.len() - shown..];

        let max_price = candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let min_price = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let range = max_price - min_price;
        let range = if range < f64::EPSILON { 1.0 } else { range };
        let row_for = |price: f64| -> u16 {
            let normalized = ((max_price - price) / range).clamp(0.0, 1.0);
            inner.y + (normalized * f64::from(price_rows - 1)).round() as u16
        };

        let max_volume = volumes.iter().map(|v| v.value).fold(0.0, f64::max);

        for (i, (candle, volume)) in candles.iter().zip(volumes).enumerate() {
            let x = inner.x + (i * col_width) as u16;
            let color = if candle.is_bullish() {
                Color::Green
            } else {
                Color::Red
            };
            let style = Style::default().fg(color);

            for y in row_for(candle.high)..=row_for(candle.low) {
                buf.set_string(x, y, "│", style);
            }
            let body_top = row_for(candle.open.max(candle.close));
            let body_bottom = row_for(candle.open.min(candle.close));
            for y in body_top..=body_bottom {
                buf.set_string(x, y, "█", style);
            }

            if max_volume > 0.0 {
                let height = ((volume.value / max_volume) * f64::from(volume_rows)).round() as u16;
                let vol_style = Style::default().fg(if volume.rising {
                    Color::Rgb(38, 166, 154)
                } else {
                    Color::Rgb(239, 83, 80)
                });
                for row in 0..height.min(volume_rows) {
                    let y = inner.y + inner.height - 1 - row;
                    buf.set_string(x, y, "▆", vol_style);
                }
            }
        }

        let label_style = Style::default().fg(Color::DarkGray);
        buf.set_string(inner.x, inner.y, format!("{:.2}", max_price), label_style);
        buf.set_string(
            inner.x,
            inner.y + price_rows - 1,
            format!("{:.2}", min_price),
            label_style,
        );
    }
}
