use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// The default number of samples retained by a [`Histogram`].
pub const DEFAULT_RESERVOIR_SIZE: usize = 1028;

/// A bounded window over the most recent samples.
///
/// Once the window is full, every new sample evicts the oldest one.
#[derive(Debug)]
struct SlidingWindow {
    capacity: usize,
    values: Mutex<VecDeque<i64>>,
}

impl SlidingWindow {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            capacity,
            values: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn update(&self, value: i64) {
        let mut values = self.values.lock();
        if values.len() == self.capacity {
            values.pop_front();
        }
        values.push_back(value);
    }

    fn snapshot(&self) -> Snapshot {
        let values = self.values.lock().iter().copied().collect();
        Snapshot::new(values)
    }
}

/// A statistical snapshot of the samples in a [`Histogram`].
///
/// All statistics weigh samples equally. An empty snapshot reports zero for every statistic.
///
/// # Example
///
/// ```
/// use hawkular_metrics::Snapshot;
///
/// let snapshot = Snapshot::new(vec![3, 8, 7, 1, 8, 4]);
/// assert_eq!(snapshot.min(), 1);
/// assert_eq!(snapshot.median(), 7.0);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    /// Sorted samples.
    values: Vec<i64>,
}

impl Snapshot {
    /// Creates a snapshot from unordered samples.
    pub fn new(mut values: Vec<i64>) -> Self {
        values.sort_unstable();
        Self { values }
    }

    /// Returns the number of samples in this snapshot.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if this snapshot contains no samples.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the samples in ascending order.
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Returns the smallest sample.
    pub fn min(&self) -> i64 {
        self.values.first().copied().unwrap_or_default()
    }

    /// Returns the largest sample.
    pub fn max(&self) -> i64 {
        self.values.last().copied().unwrap_or_default()
    }

    /// Returns the arithmetic mean of the samples.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }

        let sum: f64 = self.values.iter().map(|&v| v as f64).sum();
        sum / self.values.len() as f64
    }

    /// Returns the population standard deviation of the samples.
    pub fn std_dev(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }

        let mean = self.mean();
        let variance = self
            .values
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / self.values.len() as f64;

        variance.sqrt()
    }

    /// Returns the sample at the given quantile.
    ///
    /// The quantile must be within `[0, 1]`. This picks the sample at index `floor(q * n)` of the
    /// sorted samples, clamped to the last index.
    pub fn value(&self, quantile: f64) -> f64 {
        let Some(last) = self.values.len().checked_sub(1) else {
            return 0.0;
        };

        let index = (quantile.clamp(0.0, 1.0) * self.values.len() as f64).floor() as usize;
        self.values[index.min(last)] as f64
    }

    /// Returns the median.
    pub fn median(&self) -> f64 {
        self.value(0.5)
    }

    /// Returns the 75th percentile.
    pub fn p75(&self) -> f64 {
        self.value(0.75)
    }

    /// Returns the 95th percentile.
    pub fn p95(&self) -> f64 {
        self.value(0.95)
    }

    /// Returns the 98th percentile.
    pub fn p98(&self) -> f64 {
        self.value(0.98)
    }

    /// Returns the 99th percentile.
    pub fn p99(&self) -> f64 {
        self.value(0.99)
    }

    /// Returns the 99.9th percentile.
    pub fn p999(&self) -> f64 {
        self.value(0.999)
    }
}

/// Measures the distribution of values.
///
/// The histogram counts every update, but computes statistics only over the most recent
/// [`DEFAULT_RESERVOIR_SIZE`] samples.
#[derive(Debug)]
pub struct Histogram {
    count: AtomicU64,
    window: SlidingWindow,
}

impl Histogram {
    /// Creates a histogram retaining [`DEFAULT_RESERVOIR_SIZE`] samples.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RESERVOIR_SIZE)
    }

    /// Creates a histogram retaining up to `capacity` samples.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            window: SlidingWindow::new(capacity),
        }
    }

    /// Adds a sample.
    pub fn update(&self, value: i64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.window.update(value);
    }

    /// Returns the number of samples ever added, including evicted ones.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of the retained samples.
    pub fn snapshot(&self) -> Snapshot {
        self.window.snapshot()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn test_snapshot_statistics() {
        let snapshot = Snapshot::new(vec![3, 8, 7, 1, 8, 4]);

        assert_eq!(snapshot.values().to_vec(), vec![1, 3, 4, 7, 8, 8]);
        assert_eq!(snapshot.min(), 1);
        assert_eq!(snapshot.max(), 8);
        assert_eq!(snapshot.median(), 7.0);
        assert_eq!(snapshot.p75(), 8.0);
        assert_eq!(snapshot.p999(), 8.0);
        assert!((snapshot.mean() - 31.0 / 6.0).abs() < 1e-12);
        assert!((snapshot.std_dev() - 2.671870).abs() < 1e-6);
    }

    #[test]
    fn test_snapshot_empty() {
        let snapshot = Snapshot::default();

        assert_eq!(snapshot.min(), 0);
        assert_eq!(snapshot.max(), 0);
        assert_eq!(snapshot.mean(), 0.0);
        assert_eq!(snapshot.std_dev(), 0.0);
        assert_eq!(snapshot.value(0.99), 0.0);
    }

    #[test]
    fn test_snapshot_quantile_bounds() {
        let snapshot = Snapshot::new((1..=10).collect());

        assert_eq!(snapshot.value(0.0), 1.0);
        assert_eq!(snapshot.value(0.5), 6.0);
        assert_eq!(snapshot.value(1.0), 10.0);
    }

    #[test]
    fn test_histogram_window_evicts_oldest() {
        let histogram = Histogram::with_capacity(3);
        for value in [10, 1, 2, 3] {
            histogram.update(value);
        }

        assert_eq!(histogram.count(), 4);
        assert_eq!(histogram.snapshot().values().to_vec(), vec![1, 2, 3]);
    }
}
