//! Uptime records, hour-bucket arithmetic and window rendering
//!
//! ## Buckets
//!
//! Every observation is filed under the start of its hour:
//! `hour_bucket = floor(unix_time / 3600) * 3600`. A host has at most one
//! record per bucket; a later observation in the same hour replaces the
//! earlier one.
//!
//! ## Windows
//!
//! A window of `N` hours ends at the current bucket and is rendered oldest
//! first. A slot without a record is `Unknown`: a gap means "no data"
//! (host not yet monitored, probe skipped, monitor restarting), never "down".

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Seconds per bucket
pub const HOUR: i64 = 3600;

/// Seconds per retention day
pub const DAY: i64 = 24 * HOUR;

/// Start of the hour containing `unix_time`, using floor division.
pub fn hour_bucket(unix_time: i64) -> i64 {
    unix_time.div_euclid(HOUR) * HOUR
}

/// Oldest bucket still returned by a history query of `window_hours`.
pub fn window_start(now: i64, window_hours: u32) -> i64 {
    now - i64::from(window_hours) * HOUR
}

/// Oldest bucket that survives a prune with `retention_days`.
pub fn retention_cutoff(now: i64, retention_days: u32) -> i64 {
    now - i64::from(retention_days) * DAY
}

/// One stored observation of a host, as returned by history queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub hour_bucket: i64,
    pub is_up: bool,
}

/// Tri-state rendering of one hour slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UptimeSymbol {
    Up,
    Down,
    Unknown,
}

impl UptimeSymbol {
    pub fn emoji(&self) -> &'static str {
        match self {
            UptimeSymbol::Up => "🟩",
            UptimeSymbol::Down => "🟥",
            UptimeSymbol::Unknown => "⬜",
        }
    }
}

impl From<bool> for UptimeSymbol {
    fn from(is_up: bool) -> Self {
        if is_up {
            UptimeSymbol::Up
        } else {
            UptimeSymbol::Down
        }
    }
}

/// A rendered history window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "slots")]
pub enum UptimeWindow {
    /// The host has no record at all inside the window
    NoData,

    /// Exactly `window_hours` symbols, oldest first
    Slots(Vec<UptimeSymbol>),
}

impl UptimeWindow {
    /// Render `history` into `window_hours` slots ending at the bucket of `now`.
    pub fn render(history: &[HistoryPoint], window_hours: u32, now: i64) -> Self {
        if history.is_empty() {
            return UptimeWindow::NoData;
        }

        let by_bucket: HashMap<i64, bool> = history
            .iter()
            .map(|point| (point.hour_bucket, point.is_up))
            .collect();

        let current = hour_bucket(now);
        let slots = (0..i64::from(window_hours))
            .rev()
            .map(|offset| {
                by_bucket
                    .get(&(current - offset * HOUR))
                    .map_or(UptimeSymbol::Unknown, |is_up| UptimeSymbol::from(*is_up))
            })
            .collect();

        UptimeWindow::Slots(slots)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, UptimeWindow::NoData)
    }

    pub fn symbols(&self) -> &[UptimeSymbol] {
        match self {
            UptimeWindow::NoData => &[],
            UptimeWindow::Slots(slots) => slots,
        }
    }

    /// Emoji strip, or `None` for a window without data.
    pub fn to_emoji(&self) -> Option<String> {
        match self {
            UptimeWindow::NoData => None,
            UptimeWindow::Slots(slots) => Some(slots.iter().map(UptimeSymbol::emoji).collect()),
        }
    }

    /// Share of known slots that were up, in percent.
    pub fn uptime_percentage(&self) -> Option<f64> {
        let known: Vec<_> = self
            .symbols()
            .iter()
            .filter(|symbol| **symbol != UptimeSymbol::Unknown)
            .collect();
        if known.is_empty() {
            return None;
        }

        let up = known.iter().filter(|symbol| ***symbol == UptimeSymbol::Up).count();
        Some(up as f64 / known.len() as f64 * 100.0)
    }
}

impl fmt::Display for UptimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_emoji() {
            Some(strip) => f.write_str(&strip),
            None => f.write_str("No data yet"),
        }
    }
}
