use crate::ranges::TimeRanges;

/// Host playhead abstraction.
///
/// The engine never talks to a media element directly; the host supplies this
/// view and the engine reads position/buffer state through it and issues
/// corrective seeks. Implementations are expected to be cheap to call; the
/// playback watcher polls several times per second.
pub trait PlayheadView: Send + Sync {
    /// Current playhead position, seconds.
    fn current_time(&self) -> f64;

    /// Seekable window (single range for VOD, sliding window for live).
    fn seekable(&self) -> TimeRanges;

    /// Overall buffered ranges (intersection of per-type buffers).
    fn buffered(&self) -> TimeRanges;

    fn paused(&self) -> bool;

    /// Whether playback has ever started for this presentation.
    fn has_started_playing(&self) -> bool;

    /// Issue a corrective seek.
    fn seek_to(&self, time: f64);
}
