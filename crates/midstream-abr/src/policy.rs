use tracing::debug;

use crate::{
    estimator::Estimator,
    types::{AbrOptions, Candidate},
};

/// Why a switch was allowed or held.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SwitchReason {
    /// No current rendition: anything is an improvement.
    NoCurrent,
    /// Candidate is the current rendition.
    SameRendition,
    /// Live content: the safety-margin math does not apply.
    LiveFreely,
    /// Low-latency live before any buffer exists.
    LowLatencyStartup,
    /// Total duration too short for water-line math to be meaningful.
    ShortDuration,
    /// Down-switch allowed: forward buffer below the high water line.
    DownSwitch,
    /// Up-switch allowed: forward buffer at or above the low water line.
    UpSwitch,
    /// Down-switch held: enough buffer to ride out the current rendition.
    HeldBufferHigh,
    /// Up-switch held: not enough buffer to risk a bigger rendition.
    HeldBufferLow,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SwitchCheck {
    pub allow: bool,
    pub reason: SwitchReason,
}

impl SwitchCheck {
    fn allow(reason: SwitchReason) -> Self {
        Self {
            allow: true,
            reason,
        }
    }

    fn hold(reason: SwitchReason) -> Self {
        Self {
            allow: false,
            reason,
        }
    }
}

/// Everything the switch decision needs, captured at decision time.
#[derive(Clone, Copy, Debug)]
pub struct SwitchInputs<'a> {
    pub current: Option<&'a Candidate>,
    pub candidate: &'a Candidate,
    /// Seconds of contiguous buffer ahead of the playhead.
    pub forward_buffer_secs: f64,
    /// Elapsed playtime; drives water-line growth.
    pub playtime_secs: f64,
    /// Presentation duration; `f64::INFINITY` while live.
    pub duration: f64,
    /// Whether the stream advertises partial segments.
    pub is_low_latency: bool,
    /// Whether the relevant loader has buffered anything yet.
    pub has_buffer: bool,
}

/// The continuous "should I retarget the loaders?" decision.
///
/// Down-switches are allowed while the forward buffer sits below the high
/// water line; up-switches only once it has crossed the low water line. Both
/// lines grow with elapsed playtime up to their caps.
pub fn should_switch(opts: &AbrOptions, inputs: &SwitchInputs<'_>) -> SwitchCheck {
    let Some(current) = inputs.current else {
        return SwitchCheck::allow(SwitchReason::NoCurrent);
    };
    if current.id == inputs.candidate.id {
        return SwitchCheck::hold(SwitchReason::SameRendition);
    }

    if inputs.duration.is_infinite() {
        if !inputs.is_low_latency {
            return SwitchCheck::allow(SwitchReason::LiveFreely);
        }
        if !inputs.has_buffer {
            return SwitchCheck::allow(SwitchReason::LowLatencyStartup);
        }
        // Low-latency with buffer established: fall through to water lines.
    } else if inputs.duration < opts.low_water_line.max {
        return SwitchCheck::allow(SwitchReason::ShortDuration);
    }

    let low = opts.low_water_line.at(inputs.playtime_secs);
    let high = opts.high_water_line.at(inputs.playtime_secs);
    let forward = inputs.forward_buffer_secs;
    let is_down = inputs.candidate.bandwidth < current.bandwidth;

    debug!(
        current = current.id,
        candidate = inputs.candidate.id,
        forward,
        low,
        high,
        is_down,
        "abr::should_switch"
    );

    if is_down {
        if forward < high {
            SwitchCheck::allow(SwitchReason::DownSwitch)
        } else {
            SwitchCheck::hold(SwitchReason::HeldBufferHigh)
        }
    } else if forward >= low {
        SwitchCheck::allow(SwitchReason::UpSwitch)
    } else {
        SwitchCheck::hold(SwitchReason::HeldBufferLow)
    }
}

/// Pick the best candidate for the current estimate.
///
/// Highest bandwidth not exceeding `estimate / safety_factor`; when nothing
/// fits (or no estimate exists yet) the lowest-bandwidth candidate wins.
pub fn select_candidate(
    candidates: &[Candidate],
    estimate_bps: Option<u64>,
    safety_factor: f64,
) -> Option<Candidate> {
    if candidates.is_empty() {
        return None;
    }

    let lowest = candidates.iter().min_by_key(|c| c.bandwidth).copied();

    let Some(estimate) = estimate_bps else {
        return lowest;
    };

    let adjusted = (estimate as f64 / safety_factor.max(1.0)).max(0.0);
    candidates
        .iter()
        .filter(|c| (c.bandwidth as f64) <= adjusted)
        .max_by_key(|c| c.bandwidth)
        .copied()
        .or(lowest)
}

/// Selection straight off an estimator seam.
pub fn select_with<E: Estimator>(
    estimator: &E,
    candidates: &[Candidate],
    safety_factor: f64,
) -> Option<Candidate> {
    select_candidate(candidates, estimator.estimate_bps(), safety_factor)
}
