use std::time::Duration;

#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;

use crate::types::{SampleSource, ThroughputSample};

/// Throughput estimation seam.
///
/// Lets the scheduling layers be exercised with scripted estimates.
#[cfg_attr(test, automock)]
pub trait Estimator {
    /// Smoothed throughput in bits per second, once enough data exists.
    fn estimate_bps(&self) -> Option<u64>;

    /// Feed a completed-request measurement.
    fn push_sample(&mut self, sample: ThroughputSample);
}

/// Dual-EWMA throughput estimator.
///
/// Two exponentially-weighted averages with different half-lives; the
/// estimate is the minimum of the two, so a sudden drop registers quickly
/// while a single fast chunk cannot inflate the estimate.
#[derive(Clone, Debug)]
pub struct ThroughputEstimator {
    fast: Ewma,
    slow: Ewma,
}

impl ThroughputEstimator {
    const FAST_HALF_LIFE_SECS: f64 = 2.0;
    const SLOW_HALF_LIFE_SECS: f64 = 10.0;
    /// Chunks smaller than this say more about request overhead than network
    /// throughput.
    const MIN_CHUNK_BYTES: u64 = 16_000;
    const MIN_DURATION_MS: f64 = 0.5;

    pub fn new() -> Self {
        Self {
            fast: Ewma::new(Self::FAST_HALF_LIFE_SECS),
            slow: Ewma::new(Self::SLOW_HALF_LIFE_SECS),
        }
    }

    pub fn estimate_bps(&self) -> Option<u64> {
        let est = self.fast.estimate().min(self.slow.estimate());
        if est > 0.0 { Some(est.round() as u64) } else { None }
    }

    pub fn push_sample(&mut self, sample: ThroughputSample) {
        if sample.source != SampleSource::Network {
            return;
        }
        if sample.bytes < Self::MIN_CHUNK_BYTES {
            return;
        }
        self.push_raw(sample.bytes, sample.duration);
    }

    /// Feed a deliberately depressed sample after a request timeout, forcing
    /// the next selection toward a lower rendition.
    pub fn push_timeout(&mut self, round_trip: Duration) {
        self.push_raw(1, round_trip.max(Duration::from_millis(1)));
    }

    fn push_raw(&mut self, bytes: u64, duration: Duration) {
        let dur_ms = (duration.as_secs_f64() * 1000.0).max(Self::MIN_DURATION_MS);
        let bps = (bytes as f64) * 8000.0 / dur_ms;
        let weight_secs = dur_ms / 1000.0;

        self.fast.add_sample(weight_secs, bps);
        self.slow.add_sample(weight_secs, bps);
    }
}

impl Default for ThroughputEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator for ThroughputEstimator {
    fn estimate_bps(&self) -> Option<u64> {
        self.estimate_bps()
    }

    fn push_sample(&mut self, sample: ThroughputSample) {
        self.push_sample(sample);
    }
}

/// Estimator shared between the loaders (producers) and the controller
/// (consumer).
#[derive(Debug, Default)]
pub struct SharedEstimator {
    inner: Mutex<ThroughputEstimator>,
}

impl SharedEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn estimate_bps(&self) -> Option<u64> {
        self.inner.lock().estimate_bps()
    }

    pub fn push_sample(&self, sample: ThroughputSample) {
        self.inner.lock().push_sample(sample);
    }

    pub fn push_timeout(&self, round_trip: Duration) {
        self.inner.lock().push_timeout(round_trip);
    }
}

#[derive(Clone, Debug)]
struct Ewma {
    alpha: f64,
    last_estimate: f64,
    total_weight: f64,
}

impl Ewma {
    fn new(half_life_secs: f64) -> Self {
        Self {
            alpha: f64::exp(0.5_f64.ln() / half_life_secs.max(0.001)),
            last_estimate: 0.0,
            total_weight: 0.0,
        }
    }

    fn add_sample(&mut self, weight: f64, val: f64) {
        let adj_alpha = self.alpha.powf(weight.max(0.0));
        self.last_estimate = val * (1.0 - adj_alpha) + adj_alpha * self.last_estimate;
        self.total_weight += weight.max(0.0);
    }

    fn estimate(&self) -> f64 {
        if self.total_weight <= 0.0 {
            0.0
        } else {
            let zero_factor = 1.0 - self.alpha.powf(self.total_weight);
            self.last_estimate / zero_factor.max(1e-6)
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use web_time::Instant;

    use super::*;

    fn network_sample(bytes: u64, millis: u64) -> ThroughputSample {
        ThroughputSample {
            bytes,
            duration: Duration::from_millis(millis),
            at: Instant::now(),
            source: SampleSource::Network,
        }
    }

    #[test]
    fn no_estimate_without_samples() {
        let est = ThroughputEstimator::new();
        assert_eq!(est.estimate_bps(), None);
    }

    #[test]
    fn cache_samples_are_ignored() {
        let mut est = ThroughputEstimator::new();
        est.push_sample(ThroughputSample {
            bytes: 1_000_000,
            duration: Duration::from_millis(1),
            at: Instant::now(),
            source: SampleSource::Cache,
        });
        assert_eq!(est.estimate_bps(), None);
    }

    #[test]
    fn small_chunks_are_ignored() {
        let mut est = ThroughputEstimator::new();
        est.push_sample(network_sample(10_000, 100));
        assert_eq!(est.estimate_bps(), None);

        est.push_sample(network_sample(100_000, 1000));
        assert!(est.estimate_bps().is_some());
    }

    #[rstest]
    #[case(vec![(500_000, 1000)], 3_500_000)]
    #[case(vec![(500_000, 1000), (500_000, 1000)], 3_800_000)]
    #[case(vec![(1_000_000, 1000), (1_000_000, 1000), (1_000_000, 1000)], 7_500_000)]
    fn stable_samples_converge(#[case] samples: Vec<(u64, u64)>, #[case] expected_min_bps: u64) {
        let mut est = ThroughputEstimator::new();
        for (bytes, millis) in samples {
            est.push_sample(network_sample(bytes, millis));
        }
        let estimate = est.estimate_bps().expect("estimate after network samples");
        assert!(estimate >= expected_min_bps, "estimate {estimate} too low");
    }

    #[test]
    fn timeout_depresses_estimate() {
        let mut est = ThroughputEstimator::new();
        est.push_sample(network_sample(1_000_000, 1000));
        let healthy = est.estimate_bps().unwrap();

        est.push_timeout(Duration::from_secs(8));
        let depressed = est.estimate_bps().unwrap();

        assert!(
            depressed < healthy / 4,
            "timeout should sharply depress the estimate ({healthy} -> {depressed})"
        );
    }

    #[test]
    fn shared_estimator_is_usable_through_shared_ref() {
        let shared = SharedEstimator::new();
        shared.push_sample(network_sample(1_000_000, 1000));
        assert!(shared.estimate_bps().is_some());
    }

    #[test]
    fn very_short_durations_are_clamped() {
        let mut est = ThroughputEstimator::new();
        est.push_sample(network_sample(100_000, 0));
        let estimate = est.estimate_bps().expect("clamped duration still counts");
        assert!(estimate > 1_000_000);
    }
}
