use std::time::Duration;

use midstream_abr::WaterLine;

/// Segment-loader tuning.
///
/// Every constant here is policy, not correctness: defaults follow common
/// client practice and tests pin behavior through these options.
#[derive(Clone, Debug)]
pub struct LoaderOptions {
    /// Forward-buffer goal; the monitor stops picking once reached. Grows
    /// with elapsed playtime up to its cap.
    pub goal_buffer: WaterLine,
    /// Startup guard: with playback never started, stop after this much
    /// buffer.
    pub startup_min_buffered: f64,
    /// Boundary tolerance for mapping times onto the declared-duration walk.
    pub boundary_fudge: f64,
    /// How far a sync probe's learned start may sit from the predicted start
    /// before its payload is discarded, in units of target duration.
    pub sync_probe_tolerance_factor: f64,
    /// Request timeout as a multiple of the declared segment duration.
    pub timeout_factor: f64,
    pub min_request_timeout: Duration,
    /// Back buffer kept behind the playhead when evicting for a rejected
    /// append.
    pub back_buffer_secs: f64,
    /// Monitor cadence while `Ready`.
    pub monitor_interval: Duration,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            goal_buffer: WaterLine {
                initial: 30.0,
                rate: 1.0,
                max: 60.0,
            },
            startup_min_buffered: 1.0,
            boundary_fudge: 1.0 / 30.0,
            sync_probe_tolerance_factor: 0.5,
            timeout_factor: 1.5,
            min_request_timeout: Duration::from_secs(4),
            back_buffer_secs: 10.0,
            monitor_interval: Duration::from_millis(500),
        }
    }
}

impl LoaderOptions {
    /// Request timeout for a segment of `duration` seconds.
    ///
    /// Shortened when no fallback rendition remains, so a stalled request is
    /// detected (and retried at the same rendition) sooner.
    pub fn request_timeout(&self, duration: f64, has_fallback: bool) -> Duration {
        let scaled = Duration::from_secs_f64((duration.max(0.0) * self.timeout_factor).max(0.001));
        let base = scaled.max(self.min_request_timeout);
        if has_fallback { base } else { base / 2 }
    }
}
