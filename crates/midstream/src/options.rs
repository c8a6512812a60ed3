use std::time::Duration;

use midstream_abr::AbrOptions;
use midstream_loader::LoaderOptions;
use midstream_watch::WatcherOptions;
use tokio_util::sync::CancellationToken;

/// Engine configuration.
///
/// Used with [`crate::PlaylistController::new`]. Everything has a sensible
/// default; hosts override with the builder methods.
#[derive(Clone)]
pub struct EngineOptions {
    /// ABR policy (water lines, safety factor).
    pub abr: AbrOptions,
    /// Per-loader tuning (goal buffer, fudge, timeouts, eviction).
    pub loader: LoaderOptions,
    /// Playback-watcher tuning.
    pub watcher: WatcherOptions,
    /// Cadence of the periodic ABR check.
    pub abr_check_interval: Duration,
    /// Base rendition-exclusion window; doubles per consecutive retry.
    pub exclusion_base: Duration,
    /// Consecutive exclusions after which a rendition is excluded forever.
    pub max_exclusion_retries: u32,
    /// Live refresh cadence as a fraction of target duration.
    pub refresh_fraction: f64,
    /// Floor for the live refresh interval.
    pub min_refresh_interval: Duration,
    /// Capacity of the engine event broadcast channel.
    pub events_capacity: usize,
    /// Cancellation token for graceful shutdown.
    pub cancel: CancellationToken,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            abr: AbrOptions::default(),
            loader: LoaderOptions::default(),
            watcher: WatcherOptions::default(),
            abr_check_interval: Duration::from_secs(3),
            exclusion_base: Duration::from_secs(60),
            max_exclusion_retries: 5,
            refresh_fraction: 0.5,
            min_refresh_interval: Duration::from_secs(1),
            events_capacity: 64,
            cancel: CancellationToken::new(),
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_abr(mut self, abr: AbrOptions) -> Self {
        self.abr = abr;
        self
    }

    pub fn with_loader(mut self, loader: LoaderOptions) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_watcher(mut self, watcher: WatcherOptions) -> Self {
        self.watcher = watcher;
        self
    }

    pub fn with_abr_check_interval(mut self, interval: Duration) -> Self {
        self.abr_check_interval = interval;
        self
    }

    pub fn with_exclusion_base(mut self, base: Duration) -> Self {
        self.exclusion_base = base;
        self
    }

    pub fn with_max_exclusion_retries(mut self, retries: u32) -> Self {
        self.max_exclusion_retries = retries;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Refresh interval for a live playlist with the given target duration.
    pub fn refresh_interval(&self, target_duration: f64) -> Duration {
        let secs = (target_duration.max(0.0) * self.refresh_fraction).max(0.001);
        Duration::from_secs_f64(secs).max(self.min_refresh_interval)
    }
}
