//! # Telemetry Store
//!
//! Accumulates decoded packets into named channels of timestamped values.
//!
//! This module handles:
//! - Channel declaration (unique index and name per session)
//! - Append-only sample recording with running min/max extrema
//! - Timestamp-aligned lookups for playback
//! - A cached, lazily recomputed union of all timestamps across channels
//!
//! The store has exactly one writer (the packet-application path) and any
//! number of readers. Readers never mutate; the only interior mutability is
//! the ordered-timestamp cache, which is invalidated on every mutation and
//! recomputed on the next read.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Result, RoverLinkError};
use crate::protocol::Value;

/// Fixed chart color palette; channels take `index mod palette size`
pub const CHART_PALETTE: [&str; 8] = [
    "#4E79A7", "#F28E2B", "#E15759", "#76B7B2", "#59A14F", "#EDC948", "#B07AA1", "#FF9DA7",
];

/// One timestamped sample in a channel
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    /// Milliseconds since session start
    pub timestamp: u64,
    /// Numeric or text value
    pub value: Value,
}

/// A named, indexed time series of one telemetry signal
#[derive(Debug)]
pub struct Channel {
    index: u8,
    name: String,
    color_id: usize,
    points: Vec<DataPoint>,
    min_value: f64,
    max_value: f64,
}

impl Channel {
    fn new(index: u8, name: String) -> Self {
        Self {
            index,
            name,
            color_id: index as usize % CHART_PALETTE.len(),
            points: Vec::new(),
            min_value: f64::INFINITY,
            max_value: f64::NEG_INFINITY,
        }
    }

    /// Stable wire key
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Display key, unique per session
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Palette slot for this channel
    pub fn color_id(&self) -> usize {
        self.color_id
    }

    /// Chart color drawn from the fixed palette
    pub fn color(&self) -> &'static str {
        CHART_PALETTE[self.color_id]
    }

    /// All points in arrival order (non-decreasing timestamps)
    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    /// Running minimum over numeric values; `+inf` if none recorded
    pub fn min_value(&self) -> f64 {
        self.min_value
    }

    /// Running maximum over numeric values; `-inf` if none recorded
    pub fn max_value(&self) -> f64 {
        self.max_value
    }
}

/// Multi-channel time-series store for one telemetry session
///
/// Owned and injected explicitly: the packet-application path holds the only
/// mutable reference, readers borrow it shared.
#[derive(Debug, Default)]
pub struct TelemetryStore {
    channels: Vec<Channel>,
    latest_timestamp: u64,
    /// Cached dedup-sorted union of all channels' timestamps;
    /// `None` means dirty
    ordered_timestamps: Mutex<Option<Arc<[u64]>>>,
}

impl TelemetryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all channels and caches; called on a `Start` packet
    pub fn reset(&mut self) {
        self.channels.clear();
        self.latest_timestamp = 0;
        self.invalidate();
    }

    /// Declare a new channel
    ///
    /// # Errors
    ///
    /// Returns `RoverLinkError::DuplicateChannel` if the index or the name
    /// is already declared in the current session.
    pub fn declare_channel(&mut self, index: u8, name: &str) -> Result<()> {
        if self.channels.iter().any(|c| c.index == index) {
            return Err(RoverLinkError::DuplicateChannel(format!("index {}", index)));
        }
        if self.channels.iter().any(|c| c.name == name) {
            return Err(RoverLinkError::DuplicateChannel(name.to_string()));
        }
        self.channels.push(Channel::new(index, name.to_string()));
        self.invalidate();
        Ok(())
    }

    /// Append one sample to a declared channel
    ///
    /// Per-channel arrival order is trusted to be non-decreasing in
    /// timestamp; the store does not re-sort.
    ///
    /// # Errors
    ///
    /// Returns `RoverLinkError::UnknownChannel` if the index was never
    /// declared.
    pub fn record_sample(&mut self, channel_index: u8, timestamp: u64, value: Value) -> Result<()> {
        let channel = self
            .channels
            .iter_mut()
            .find(|c| c.index == channel_index)
            .ok_or_else(|| RoverLinkError::UnknownChannel(format!("index {}", channel_index)))?;

        if let Some(number) = value.as_number() {
            channel.min_value = channel.min_value.min(number);
            channel.max_value = channel.max_value.max(number);
        }
        channel.points.push(DataPoint { timestamp, value });

        self.latest_timestamp = self.latest_timestamp.max(timestamp);
        self.invalidate();
        Ok(())
    }

    /// All declared channel names, in declaration order
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }

    /// All declared channels, in declaration order
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Look up a channel by name
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// A channel's points in arrival order
    ///
    /// # Errors
    ///
    /// Returns `RoverLinkError::UnknownChannel` if the name was never
    /// declared.
    pub fn points_for(&self, name: &str) -> Result<&[DataPoint]> {
        self.channel(name)
            .map(|c| c.points.as_slice())
            .ok_or_else(|| RoverLinkError::UnknownChannel(name.to_string()))
    }

    /// The value of the latest point at or before `timestamp`
    ///
    /// `None` if the channel has no point that early. Binary search over the
    /// per-channel sorted points; ties resolve to the last point of an equal
    /// run.
    ///
    /// # Errors
    ///
    /// Returns `RoverLinkError::UnknownChannel` if the name was never
    /// declared.
    pub fn value_at_or_before(&self, name: &str, timestamp: u64) -> Result<Option<&Value>> {
        let points = self.points_for(name)?;
        let index = points.partition_point(|p| p.timestamp <= timestamp);
        Ok(index.checked_sub(1).map(|i| &points[i].value))
    }

    /// Minimum over the named channels' cached extrema
    ///
    /// Defaults to all channels when `names` is `None`; names not declared
    /// are skipped. Returns `+inf` when no numeric data exists; callers own
    /// that sentinel (it is never coerced to 0 here).
    pub fn min_y(&self, names: Option<&[&str]>) -> f64 {
        self.selected(names)
            .fold(f64::INFINITY, |acc, c| acc.min(c.min_value))
    }

    /// Maximum over the named channels' cached extrema
    ///
    /// Defaults to all channels when `names` is `None`; names not declared
    /// are skipped. Returns `-inf` when no numeric data exists.
    pub fn max_y(&self, names: Option<&[&str]>) -> f64 {
        self.selected(names)
            .fold(f64::NEG_INFINITY, |acc, c| acc.max(c.max_value))
    }

    /// The deduplicated ascending union of every point's timestamp
    ///
    /// Recomputed lazily after a mutation and cached until the next one;
    /// repeated reads between mutations share the same allocation.
    pub fn ordered_timestamps(&self) -> Arc<[u64]> {
        let mut cache = self
            .ordered_timestamps
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(timestamps) = cache.as_ref() {
            return Arc::clone(timestamps);
        }

        let union: BTreeSet<u64> = self
            .channels
            .iter()
            .flat_map(|c| c.points.iter().map(|p| p.timestamp))
            .collect();
        let timestamps: Arc<[u64]> = union.into_iter().collect();
        *cache = Some(Arc::clone(&timestamps));
        timestamps
    }

    /// High-water mark over all recorded timestamps
    pub fn latest_timestamp(&self) -> u64 {
        self.latest_timestamp
    }

    fn selected<'a>(&'a self, names: Option<&'a [&'a str]>) -> impl Iterator<Item = &'a Channel> {
        self.channels
            .iter()
            .filter(move |c| names.map_or(true, |names| names.contains(&c.name.as_str())))
    }

    fn invalidate(&mut self) {
        *self
            .ordered_timestamps
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Format a millisecond timestamp as "M:SS.mmm" for log output
pub fn format_timestamp(timestamp: u64) -> String {
    let minutes = timestamp / 60_000;
    let seconds = (timestamp % 60_000) / 1_000;
    let milliseconds = timestamp % 1_000;
    format!("{}:{:02}.{:03}", minutes, seconds, milliseconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_channels() -> TelemetryStore {
        let mut store = TelemetryStore::new();
        store.declare_channel(0, "left_distance").unwrap();
        store.declare_channel(1, "right_distance").unwrap();
        store
    }

    #[test]
    fn test_declare_channel_duplicates_rejected() {
        let mut store = store_with_channels();

        let by_index = store.declare_channel(0, "other");
        assert!(matches!(by_index, Err(RoverLinkError::DuplicateChannel(_))));

        let by_name = store.declare_channel(9, "left_distance");
        assert!(matches!(by_name, Err(RoverLinkError::DuplicateChannel(_))));
    }

    #[test]
    fn test_record_sample_undeclared_channel() {
        let mut store = store_with_channels();
        let result = store.record_sample(42, 100, Value::Number(1.0));
        assert!(matches!(result, Err(RoverLinkError::UnknownChannel(_))));
    }

    #[test]
    fn test_channel_names_in_declaration_order() {
        let store = store_with_channels();
        assert_eq!(store.channel_names(), vec!["left_distance", "right_distance"]);
    }

    #[test]
    fn test_color_id_wraps_around_palette() {
        let mut store = TelemetryStore::new();
        store.declare_channel(1, "a").unwrap();
        store
            .declare_channel(1 + CHART_PALETTE.len() as u8, "b")
            .unwrap();

        assert_eq!(store.channel("a").unwrap().color_id(), 1);
        assert_eq!(store.channel("b").unwrap().color_id(), 1);
        assert_eq!(store.channel("a").unwrap().color(), CHART_PALETTE[1]);
    }

    #[test]
    fn test_min_max_numeric_extrema() {
        let mut store = store_with_channels();
        for (i, value) in [2.0, 1.0, 3.0].iter().enumerate() {
            store
                .record_sample(0, i as u64 * 100, Value::Number(*value))
                .unwrap();
        }

        assert_eq!(store.min_y(None), 1.0);
        assert_eq!(store.max_y(None), 3.0);
        assert_eq!(store.channel("left_distance").unwrap().min_value(), 1.0);
        assert_eq!(store.channel("left_distance").unwrap().max_value(), 3.0);
    }

    #[test]
    fn test_min_max_text_only_channel_keeps_sentinels() {
        let mut store = store_with_channels();
        store
            .record_sample(0, 100, Value::Text("ready".to_string()))
            .unwrap();

        // Callers must handle the sentinels; the store never coerces to 0
        assert_eq!(store.min_y(None), f64::INFINITY);
        assert_eq!(store.max_y(None), f64::NEG_INFINITY);
    }

    #[test]
    fn test_min_max_with_channel_filter() {
        let mut store = store_with_channels();
        store.record_sample(0, 0, Value::Number(-5.0)).unwrap();
        store.record_sample(1, 0, Value::Number(50.0)).unwrap();

        assert_eq!(store.min_y(Some(&["right_distance"])), 50.0);
        assert_eq!(store.max_y(Some(&["left_distance"])), -5.0);
        // Undeclared names in the filter are skipped
        assert_eq!(store.min_y(Some(&["missing"])), f64::INFINITY);
    }

    #[test]
    fn test_value_at_or_before() {
        let mut store = store_with_channels();
        store
            .record_sample(0, 100, Value::Text("a".to_string()))
            .unwrap();
        store
            .record_sample(0, 200, Value::Text("b".to_string()))
            .unwrap();

        let at = |t| store.value_at_or_before("left_distance", t).unwrap();
        assert_eq!(at(50), None);
        assert_eq!(at(100), Some(&Value::Text("a".to_string())));
        assert_eq!(at(150), Some(&Value::Text("a".to_string())));
        assert_eq!(at(200), Some(&Value::Text("b".to_string())));
    }

    #[test]
    fn test_value_at_or_before_empty_and_unknown() {
        let store = store_with_channels();
        assert_eq!(store.value_at_or_before("left_distance", 100).unwrap(), None);
        assert!(matches!(
            store.value_at_or_before("missing", 100),
            Err(RoverLinkError::UnknownChannel(_))
        ));
    }

    #[test]
    fn test_ordered_timestamps_union_sorted_dedup() {
        let mut store = store_with_channels();
        store.record_sample(0, 300, Value::Number(1.0)).unwrap();
        store.record_sample(1, 100, Value::Number(2.0)).unwrap();
        store.record_sample(1, 300, Value::Number(3.0)).unwrap();
        store.record_sample(0, 400, Value::Number(4.0)).unwrap();

        assert_eq!(store.ordered_timestamps().as_ref(), &[100, 300, 400]);
    }

    #[test]
    fn test_ordered_timestamps_cache_invalidated_by_mutation() {
        let mut store = store_with_channels();
        store.record_sample(0, 100, Value::Number(1.0)).unwrap();

        // Prime the cache, then mutate; the next read must see the new point
        assert_eq!(store.ordered_timestamps().as_ref(), &[100]);
        store.record_sample(0, 200, Value::Number(2.0)).unwrap();
        assert_eq!(store.ordered_timestamps().as_ref(), &[100, 200]);
    }

    #[test]
    fn test_ordered_timestamps_cached_between_reads() {
        let mut store = store_with_channels();
        store.record_sample(0, 100, Value::Number(1.0)).unwrap();

        let first = store.ordered_timestamps();
        let second = store.ordered_timestamps();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_latest_timestamp_high_water_mark() {
        let mut store = store_with_channels();
        store.record_sample(0, 500, Value::Number(1.0)).unwrap();
        // A later-arriving sample on another channel with a smaller
        // timestamp does not lower the mark
        store.record_sample(1, 200, Value::Number(2.0)).unwrap();

        assert_eq!(store.latest_timestamp(), 500);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut store = store_with_channels();
        store.record_sample(0, 100, Value::Number(1.0)).unwrap();
        store.ordered_timestamps(); // prime the cache

        store.reset();

        assert!(store.channel_names().is_empty());
        assert_eq!(store.latest_timestamp(), 0);
        assert!(store.ordered_timestamps().is_empty());
        // Channels can be re-declared in the new session
        store.declare_channel(0, "left_distance").unwrap();
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "0:00.000");
        assert_eq!(format_timestamp(1_234), "0:01.234");
        assert_eq!(format_timestamp(83_456), "1:23.456");
        assert_eq!(format_timestamp(600_000), "10:00.000");
    }
}
