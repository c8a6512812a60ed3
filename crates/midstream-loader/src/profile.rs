use midstream_core::{TimingInfo, TrackType};

use crate::traits::DemuxOutput;

/// Track-specific loader behavior.
///
/// One generic loader serves every track type; the profile supplies the few
/// decisions that differ: which demuxed timing confirms an append, which
/// sink queue the payload buffers into, and whether this loader authors
/// timestamp offsets for new timelines.
pub trait TrackProfile: Send + Sync {
    fn track(&self) -> TrackType;

    /// The timing info that confirms this loader's append, from the demuxer
    /// output. `None` means the payload carried nothing usable.
    fn confirms_timing(&self, output: &DemuxOutput) -> Option<TimingInfo>;

    /// Sink queue the payload buffers into.
    fn buffers_into(&self) -> TrackType;

    /// Whether this loader may author the timestamp offset for a timeline.
    /// Only the primary loader is authoritative; dependents wait on it.
    fn selects_timestamp_offset(&self) -> bool;
}

/// Muxed or video-led main track.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrimaryProfile;

impl TrackProfile for PrimaryProfile {
    fn track(&self) -> TrackType {
        TrackType::Primary
    }

    fn confirms_timing(&self, output: &DemuxOutput) -> Option<TimingInfo> {
        // Video timing leads; audio-only presentations fall back to audio.
        output.video_timing.or(output.audio_timing)
    }

    fn buffers_into(&self) -> TrackType {
        TrackType::Primary
    }

    fn selects_timestamp_offset(&self) -> bool {
        true
    }
}

/// Demuxed alternate-audio track.
#[derive(Clone, Copy, Debug, Default)]
pub struct AudioProfile;

impl TrackProfile for AudioProfile {
    fn track(&self) -> TrackType {
        TrackType::AlternateAudio
    }

    fn confirms_timing(&self, output: &DemuxOutput) -> Option<TimingInfo> {
        output.audio_timing
    }

    fn buffers_into(&self) -> TrackType {
        TrackType::AlternateAudio
    }

    fn selects_timestamp_offset(&self) -> bool {
        false
    }
}
