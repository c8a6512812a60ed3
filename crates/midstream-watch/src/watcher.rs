use std::{sync::Arc, time::Duration};

use midstream_core::{PlayheadView, TimeRanges};
use tracing::{debug, warn};

/// Watcher tuning. Every value here is empirically-tuned policy; tests and
/// hosts pin behavior through these options rather than the literals.
#[derive(Clone, Debug)]
pub struct WatcherOptions {
    /// Poll cadence.
    pub poll_interval: Duration,
    /// Consecutive same-position polls that count as a stall.
    pub stall_threshold_polls: u32,
    /// Landing offset past a gap's far edge.
    pub gap_skip_epsilon: f64,
    /// Gaps wider than this are under-buffering, not skippable gaps.
    pub max_gap_secs: f64,
    /// Safety delta when snapping to the seekable start.
    pub seekable_start_delta: f64,
    /// How far audio may over-run a video-only gap before the fix is a
    /// decoder resync rather than a gap skip.
    pub audio_overrun_window_secs: f64,
    /// Forward content required past a seek target before the target counts
    /// as a real gap.
    pub gap_confidence_ahead_secs: f64,
    /// Positions closer than this count as "not moving".
    pub position_epsilon: f64,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            stall_threshold_polls: 5,
            gap_skip_epsilon: 1.0 / 30.0,
            max_gap_secs: 3.0,
            seekable_start_delta: 0.1,
            audio_overrun_window_secs: 3.0,
            gap_confidence_ahead_secs: 1.0,
            position_epsilon: 1e-4,
        }
    }
}

/// Per-poll facts the watcher cannot observe through the playhead view.
#[derive(Clone, Debug, Default)]
pub struct WatchInputs {
    /// Per-type buffers, when the presentation has that type.
    pub video_buffered: Option<TimeRanges>,
    pub audio_buffered: Option<TimeRanges>,
    /// A host seek is in flight.
    pub seeking: bool,
    /// A loader is mid-request or mid-append; stalls are expected then.
    pub loaders_busy: bool,
    pub live: bool,
}

/// What a watcher pass did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WatcherAction {
    None,
    /// Seek target was beyond the seekable window's end.
    SnappedToSeekableEnd(f64),
    /// Seek target was before the seekable window's start.
    SnappedToSeekableStart(f64),
    /// Jumped a small unbuffered gap to the next range's start.
    SkippedGap(f64),
    /// Fell out of the live window; jumped back to the live edge.
    ResyncedToLiveEdge(f64),
    /// Audio over-ran a video-only gap; re-seek in place to resync decoders.
    NudgedForVideoUnderflow(f64),
}

/// Observes playhead progress independently of the loaders and intervenes
/// only when playback would otherwise stay stuck.
pub struct PlaybackWatcher {
    playhead: Arc<dyn PlayheadView>,
    options: WatcherOptions,
    last_position: Option<f64>,
    same_position_polls: u32,
}

impl PlaybackWatcher {
    pub fn new(playhead: Arc<dyn PlayheadView>, options: WatcherOptions) -> Self {
        Self {
            playhead,
            options,
            last_position: None,
            same_position_polls: 0,
        }
    }

    /// One poll: bad-seek correction when seeking, stall detection otherwise.
    pub fn tick(&mut self, inputs: &WatchInputs) -> WatcherAction {
        if inputs.seeking {
            self.same_position_polls = 0;
            return self.fix_bad_seeks(inputs);
        }

        if self.playhead.paused() {
            self.same_position_polls = 0;
            return WatcherAction::None;
        }

        let current = self.playhead.current_time();
        let moved = self
            .last_position
            .is_none_or(|last| (current - last).abs() > self.options.position_epsilon);
        self.last_position = Some(current);

        if moved || inputs.loaders_busy {
            self.same_position_polls = 0;
            return WatcherAction::None;
        }

        self.same_position_polls += 1;
        if self.same_position_polls < self.options.stall_threshold_polls {
            return WatcherAction::None;
        }

        // A stall that persists across the threshold runs the waiting path
        // even without a native waiting signal.
        debug!(
            current,
            polls = self.same_position_polls,
            "playback_watcher::stall_detected"
        );
        self.same_position_polls = 0;
        self.handle_waiting(inputs)
    }

    /// Corrective logic for seeks into unbuffered or out-of-window targets.
    pub fn fix_bad_seeks(&mut self, inputs: &WatchInputs) -> WatcherAction {
        let current = self.playhead.current_time();
        let seekable = self.playhead.seekable();
        let Some(window_end) = seekable.end() else {
            return WatcherAction::None;
        };
        let window_start = seekable.start().unwrap_or(0.0);

        if current > window_end {
            let target = window_end;
            warn!(current, target, "playback_watcher::seek_past_window");
            self.playhead.seek_to(target);
            return WatcherAction::SnappedToSeekableEnd(target);
        }

        if current < window_start {
            let target = window_start + self.options.seekable_start_delta;
            warn!(current, target, "playback_watcher::seek_before_window");
            self.playhead.seek_to(target);
            return WatcherAction::SnappedToSeekableStart(target);
        }

        // Seek landed in a gap: only correct once enough content sits past
        // the target to prove it is a gap rather than under-buffering.
        let buffered = self.playhead.buffered();
        if !buffered.contains(current)
            && let Some(next) = buffered.next_range_after(current)
            && next.duration() >= self.options.gap_confidence_ahead_secs
        {
            let target = next.start + self.options.gap_skip_epsilon;
            debug!(current, target, "playback_watcher::seek_into_gap");
            self.playhead.seek_to(target);
            return WatcherAction::SkippedGap(target);
        }

        WatcherAction::None
    }

    /// The underflow/waiting path: classify why playback is stuck and fix it.
    pub fn handle_waiting(&mut self, inputs: &WatchInputs) -> WatcherAction {
        let current = self.playhead.current_time();

        // Fell out of a sliding live window.
        if inputs.live {
            let seekable = self.playhead.seekable();
            if let (Some(start), Some(end)) = (seekable.start(), seekable.end())
                && current < start
            {
                warn!(current, live_edge = end, "playback_watcher::live_fallout");
                self.playhead.seek_to(end);
                return WatcherAction::ResyncedToLiveEdge(end);
            }
        }

        // Audio over-ran a video-only gap: both decoders need a resync,
        // which a seek-in-place forces.
        if self.video_underflow(current, inputs) {
            warn!(current, "playback_watcher::video_underflow");
            self.playhead.seek_to(current);
            return WatcherAction::NudgedForVideoUnderflow(current);
        }

        // A genuine small gap just ahead.
        let buffered = self.playhead.buffered();
        if let Some(next) = buffered.next_range_after(current)
            && next.start - current <= self.options.max_gap_secs
        {
            let target = next.start + self.options.gap_skip_epsilon;
            debug!(current, target, "playback_watcher::skip_gap");
            self.playhead.seek_to(target);
            return WatcherAction::SkippedGap(target);
        }

        WatcherAction::None
    }

    fn video_underflow(&self, current: f64, inputs: &WatchInputs) -> bool {
        let (Some(video), Some(audio)) = (&inputs.video_buffered, &inputs.audio_buffered) else {
            return false;
        };
        if video.contains(current) || !audio.contains(current) {
            return false;
        }
        // Video ran out within the overrun window while audio kept going.
        video
            .iter()
            .rev()
            .map(|r| r.end)
            .find(|&end| end <= current)
            .is_some_and(|video_end| current - video_end <= self.options.audio_overrun_window_secs)
    }
}
