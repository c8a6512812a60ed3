use std::time::Duration;

use web_time::Instant;

/// Where a throughput sample came from.
///
/// Cache reads say nothing about the network and are excluded from the
/// bandwidth estimate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SampleSource {
    Network,
    Cache,
}

/// One completed request measured for the estimator.
#[derive(Clone, Copy, Debug)]
pub struct ThroughputSample {
    pub bytes: u64,
    pub duration: Duration,
    pub at: Instant,
    pub source: SampleSource,
}

/// A rendition as the ABR policy sees it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Candidate {
    pub id: u64,
    pub bandwidth: u64,
}

/// A buffer threshold that grows with elapsed playtime up to a cap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaterLine {
    pub initial: f64,
    /// Growth in seconds of threshold per second of playtime.
    pub rate: f64,
    pub max: f64,
}

impl WaterLine {
    pub fn at(&self, playtime_secs: f64) -> f64 {
        (self.initial + playtime_secs.max(0.0) * self.rate).min(self.max)
    }
}

/// ABR policy configuration.
#[derive(Clone, Debug)]
pub struct AbrOptions {
    /// Estimate divisor: selection uses `estimate / safety_factor`.
    pub safety_factor: f64,
    /// Up-switches require at least this much forward buffer.
    pub low_water_line: WaterLine,
    /// Down-switches are allowed while forward buffer is below this.
    pub high_water_line: WaterLine,
}

impl Default for AbrOptions {
    fn default() -> Self {
        Self {
            safety_factor: 1.5,
            low_water_line: WaterLine {
                initial: 0.0,
                rate: 1.0,
                max: 30.0,
            },
            high_water_line: WaterLine {
                initial: 30.0,
                rate: 1.0,
                max: 45.0,
            },
        }
    }
}
