//! Offset-median fair price.
//!
//! The venue and the reference exchange track each other with a
//! roughly constant basis. We sample `venue_mid - reference_mid` at
//! most once a second into a fixed ring, and price off the latest
//! reference mid plus the median offset over a trailing window. The
//! median shrugs off the outliers a thin venue book produces.

use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tracing::debug;

use omm_core::Price;

/// Ring capacity. At one sample per second this holds well over the
/// default five-minute window.
const CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy)]
struct OffsetSample {
    offset: Decimal,
    ts_ms: u64,
}

/// Fair price estimator over venue/reference mid offsets.
#[derive(Debug)]
pub struct OffsetMedianEstimator {
    samples: Vec<OffsetSample>,
    head: usize,
    count: usize,
    last_sample_second: Option<u64>,
    window_ms: u64,
    warmup: Duration,
    created_at: Instant,
}

impl OffsetMedianEstimator {
    pub fn new(window_ms: u64, warmup: Duration) -> Self {
        Self {
            samples: Vec::with_capacity(CAPACITY),
            head: 0,
            count: 0,
            last_sample_second: None,
            window_ms,
            warmup,
            created_at: Instant::now(),
        }
    }

    /// Record one offset observation. At most one sample is kept per
    /// wall-clock second; extra observations in the same second, and
    /// observations whose timestamp runs backwards, are dropped.
    /// Returns whether the sample was stored.
    pub fn add_sample(&mut self, venue_mid: Price, reference_mid: Price, ts_ms: u64) -> bool {
        let second = ts_ms / 1000;
        if let Some(last) = self.last_sample_second {
            if second <= last {
                return false;
            }
        }
        self.last_sample_second = Some(second);

        let sample = OffsetSample {
            offset: venue_mid.inner() - reference_mid.inner(),
            ts_ms,
        };
        if self.samples.len() < CAPACITY {
            self.samples.push(sample);
        } else {
            // Overwrite the oldest slot.
            self.samples[self.head] = sample;
        }
        self.head = (self.head + 1) % CAPACITY;
        self.count = (self.count + 1).min(CAPACITY);
        true
    }

    /// Fair price off the latest reference mid, or None while warming
    /// up or when no sample falls inside the window. Expired samples
    /// are filtered here, never eagerly pruned.
    pub fn fair_price(&self, reference_mid: Price, now_ms: u64) -> Option<Price> {
        if !self.is_warm() {
            return None;
        }
        let cutoff = now_ms.saturating_sub(self.window_ms);
        let mut offsets: Vec<Decimal> = self
            .samples
            .iter()
            .filter(|s| s.ts_ms >= cutoff)
            .map(|s| s.offset)
            .collect();
        if offsets.is_empty() {
            debug!("no in-window offset samples");
            return None;
        }
        offsets.sort_unstable();
        Some(Price::new(reference_mid.inner() + median_of_sorted(&offsets)))
    }

    /// Warmup requires wall time since construction, not sample count:
    /// a burst of samples right after start says nothing about the
    /// basis being stable.
    pub fn is_warm(&self) -> bool {
        self.created_at.elapsed() >= self.warmup
    }

    /// (elapsed, required) seconds, for status logging.
    pub fn warmup_progress(&self) -> (u64, u64) {
        let elapsed = self.created_at.elapsed().as_secs();
        (elapsed.min(self.warmup.as_secs()), self.warmup.as_secs())
    }

    pub fn sample_count(&self) -> usize {
        self.count
    }
}

fn median_of_sorted(sorted: &[Decimal]) -> Decimal {
    let n = sorted.len();
    let mid = n / 2;
    if n % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / Decimal::TWO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn warm_estimator(window_ms: u64) -> OffsetMedianEstimator {
        OffsetMedianEstimator::new(window_ms, Duration::ZERO)
    }

    fn p(v: Decimal) -> Price {
        Price::new(v)
    }

    #[test]
    fn test_median_even_count_is_mean_of_middle() {
        let mut est = warm_estimator(300_000);
        for (i, offset) in [dec!(1), dec!(2), dec!(3), dec!(4)].iter().enumerate() {
            est.add_sample(p(dec!(100) + offset), p(dec!(100)), (i as u64 + 1) * 1000);
        }
        let fair = est.fair_price(p(dec!(100)), 5_000).unwrap();
        assert_eq!(fair, p(dec!(102.5)));
    }

    #[test]
    fn test_median_odd_count() {
        let mut est = warm_estimator(300_000);
        for (i, offset) in [dec!(5), dec!(-1), dec!(2)].iter().enumerate() {
            est.add_sample(p(dec!(100) + offset), p(dec!(100)), (i as u64 + 1) * 1000);
        }
        assert_eq!(est.fair_price(p(dec!(100)), 4_000), Some(p(dec!(102))));
    }

    #[test]
    fn test_warmup_gates_fair_price() {
        let mut est = OffsetMedianEstimator::new(300_000, Duration::from_secs(3600));
        est.add_sample(p(dec!(101)), p(dec!(100)), 1000);
        assert!(!est.is_warm());
        assert_eq!(est.fair_price(p(dec!(100)), 2000), None);

        let (elapsed, required) = est.warmup_progress();
        assert!(elapsed < required);
        assert_eq!(required, 3600);
    }

    #[test]
    fn test_no_in_window_samples_means_no_price() {
        let mut est = warm_estimator(10_000);
        est.add_sample(p(dec!(101)), p(dec!(100)), 1_000);
        // Sample aged out of the window.
        assert_eq!(est.fair_price(p(dec!(100)), 20_000), None);
    }

    #[test]
    fn test_same_second_sample_dropped() {
        let mut est = warm_estimator(300_000);
        assert!(est.add_sample(p(dec!(101)), p(dec!(100)), 1_000));
        assert!(!est.add_sample(p(dec!(150)), p(dec!(100)), 1_500));
        assert_eq!(est.sample_count(), 1);
        // The rejected outlier never entered the buffer.
        assert_eq!(est.fair_price(p(dec!(100)), 2_000), Some(p(dec!(101))));
    }

    #[test]
    fn test_backwards_timestamp_dropped() {
        let mut est = warm_estimator(300_000);
        assert!(est.add_sample(p(dec!(101)), p(dec!(100)), 5_000));
        // A late-arriving observation for an earlier second must not
        // double-count that second.
        assert!(!est.add_sample(p(dec!(150)), p(dec!(100)), 3_000));
        assert_eq!(est.sample_count(), 1);
        assert_eq!(est.fair_price(p(dec!(100)), 6_000), Some(p(dec!(101))));
    }

    #[test]
    fn test_capacity_overwrites_oldest() {
        let mut est = warm_estimator(u64::MAX / 2);
        // 501 samples, offsets 0..=500; the first (offset 0) is evicted.
        for i in 0..=500u64 {
            assert!(est.add_sample(
                p(dec!(100) + Decimal::from(i)),
                p(dec!(100)),
                (i + 1) * 1000
            ));
        }
        assert_eq!(est.sample_count(), 500);
        // Remaining offsets are 1..=500; median = (250 + 251) / 2.
        let fair = est.fair_price(p(dec!(100)), 502_000).unwrap();
        assert_eq!(fair, p(dec!(350.5)));
    }
}
