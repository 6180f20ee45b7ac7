use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

const ZERO: AtomicU64 = AtomicU64::new(0);

/// Per-session counters. Updated from any thread without locking.
#[derive(Debug)]
pub struct Metrics {
    counters: [AtomicU64; DataPoint::Length as usize],
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            counters: [ZERO; DataPoint::Length as usize],
        }
    }

    // Returns the count of a particular data point.
    pub fn get_count(&self, data_point: DataPoint) -> u64 {
        self.counters[data_point as usize].load(Ordering::Relaxed)
    }

    // Increments the value of a particular data point.
    pub(crate) fn increment(&self, data_point: DataPoint) {
        self.counters[data_point as usize].fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "transitions: {} accepted, {} rejected; rate updates: {} ({} up, {} down); \
             loss reports: {}; shutdowns sent: {}",
            self.get_count(DataPoint::TransitionsAccepted),
            self.get_count(DataPoint::TransitionsRejected),
            self.get_count(DataPoint::RateUpdates),
            self.get_count(DataPoint::RateIncreases),
            self.get_count(DataPoint::RateDecreases),
            self.get_count(DataPoint::LossReports),
            self.get_count(DataPoint::ShutdownsSent),
        )
    }
}

#[derive(Copy, Clone, Debug, PartialOrd, PartialEq)]
pub enum DataPoint {
    TransitionsAccepted = 0,
    TransitionsRejected = 1,
    RateUpdates = 2,
    RateIncreases = 3,
    RateDecreases = 4,
    LossReports = 5,
    ShutdownsSent = 6,
    Length = 7,
}

#[cfg(test)]
mod test {
    use super::{DataPoint, Metrics};

    #[test]
    fn can_increment_and_fetch_count() {
        let metrics = Metrics::new();
        metrics.increment(DataPoint::TransitionsAccepted);
        assert_eq!(metrics.get_count(DataPoint::TransitionsAccepted), 1);
    }

    #[test]
    fn can_increment_many() {
        let metrics = Metrics::new();
        for _ in 0..10 {
            metrics.increment(DataPoint::RateUpdates);
        }
        assert_eq!(metrics.get_count(DataPoint::RateUpdates), 10)
    }

    #[test]
    fn display_lists_counters() {
        let metrics = Metrics::new();
        metrics.increment(DataPoint::TransitionsRejected);
        assert_eq!(
            metrics.to_string(),
            "transitions: 0 accepted, 1 rejected; rate updates: 0 (0 up, 0 down); \
             loss reports: 0; shutdowns sent: 0"
        );
    }
}
