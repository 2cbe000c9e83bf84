use std::collections::VecDeque;

use crate::model::bar::Bar;

/// Bars retained per market+interval stream unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 100;

/// Rolling, capacity-bounded window of bars ordered by `open_time`.
///
/// A bar whose `open_time` is already present replaces that entry (the live
/// candle is amended in place); any other bar is appended. Callers deliver new
/// bars in ascending order, the buffer never re-sorts. Once over capacity the
/// oldest bars are evicted first.
#[derive(Debug, Clone, PartialEq)]
pub struct BarBuffer {
    bars: VecDeque<Bar>,
    capacity: usize,
}

impl BarBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            bars: VecDeque::new(),
            capacity,
        }
    }

    /// Integrate one bar and return the resulting buffer.
    pub fn integrate(mut self, bar: Bar) -> Self {
        match self.position_of(bar.open_time) {
            Some(index) => self.bars[index] = bar,
            None => self.bars.push_back(bar),
        }
        while self.bars.len() > self.capacity {
            self.bars.pop_front();
        }
        self
    }

    fn position_of(&self, open_time: u64) -> Option<usize> {
        // The amended bar is almost always the newest one.
        self.bars
            .iter()
            .rposition(|existing| existing.open_time == open_time)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.front()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }

    pub fn to_vec(&self) -> Vec<Bar> {
        self.bars.iter().cloned().collect()
    }
}

impl Default for BarBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
