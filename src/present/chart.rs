use chrono::{DateTime, TimeZone, Timelike};
use std::collections::VecDeque;

/// Number of points the confidence chart keeps.
pub const DEFAULT_CHART_CAPACITY: usize = 30;

#[derive(Clone, Debug, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

/// Bounded rolling window of (label, confidence) points, oldest first.
///
/// Pushing onto a full series evicts the oldest point. `len() <= capacity()` always holds.
#[derive(Clone, Debug)]
pub struct ChartSeries {
    points: VecDeque<ChartPoint>,
    capacity: usize,
}

impl ChartSeries {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHART_CAPACITY)
    }

    /// A capacity of 0 is raised to 1. Storage grows with the points, not the bound.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity.min(DEFAULT_CHART_CAPACITY) + 1),
            capacity,
        }
    }

    /// Append a point, evicting the oldest one when the bound would be exceeded.
    pub fn push(&mut self, label: impl Into<String>, value: f64) -> Option<ChartPoint> {
        self.points.push_back(ChartPoint {
            label: label.into(),
            value,
        });
        if self.points.len() > self.capacity {
            self.points.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn points(&self) -> impl Iterator<Item = &ChartPoint> + '_ {
        self.points.iter()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.points.iter().map(|p| p.label.as_str()).collect()
    }

    pub fn latest(&self) -> Option<&ChartPoint> {
        self.points.back()
    }
}

impl Default for ChartSeries {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall-clock label `H:M:S` without zero padding, e.g. `9:5:7`.
pub fn chart_label<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    format!("{}:{}:{}", at.hour(), at.minute(), at.second())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn keeps_most_recent_points_oldest_first() {
        let mut series = ChartSeries::with_capacity(3);
        for i in 0..5 {
            series.push(format!("t{}", i), i as f64);
        }
        assert_eq!(series.len(), 3);
        assert_eq!(series.values(), vec![2.0, 3.0, 4.0]);
        assert_eq!(series.labels(), vec!["t2", "t3", "t4"]);
    }

    #[test]
    fn push_returns_evicted_point() {
        let mut series = ChartSeries::with_capacity(1);
        assert_eq!(series.push("a", 0.1), None);
        let evicted = series.push("b", 0.2).expect("evicted point");
        assert_eq!(evicted.label, "a");
        assert_eq!(series.latest().map(|p| p.value), Some(0.2));
    }

    #[test]
    fn default_capacity_is_thirty() {
        let mut series = ChartSeries::default();
        for _ in 0..31 {
            series.push("x", 0.0);
        }
        assert_eq!(series.capacity(), DEFAULT_CHART_CAPACITY);
        assert_eq!(series.len(), 30);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut series = ChartSeries::with_capacity(0);
        series.push("a", 1.0);
        series.push("b", 2.0);
        assert_eq!(series.values(), vec![2.0]);
    }

    #[test]
    fn huge_capacity_does_not_preallocate() {
        let mut series = ChartSeries::with_capacity(usize::MAX);
        series.push("a", 0.5);
        assert_eq!(series.capacity(), usize::MAX);
        assert_eq!(series.values(), vec![0.5]);
    }

    #[test]
    fn labels_are_unpadded() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap();
        assert_eq!(chart_label(&at), "9:5:7");
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 10).unwrap();
        assert_eq!(chart_label(&at), "23:59:10");
    }
}
