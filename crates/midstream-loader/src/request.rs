use midstream_core::{TimingInfo, Timeline};
use midstream_playlist::PlaylistId;

/// The monitor loop's pick: which segment/part to request next and why.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NextRequest {
    pub segment_index: usize,
    pub part_index: Option<usize>,
    pub media_sequence: u64,
    /// Predicted presentation start of the pick.
    pub start_of_segment: f64,
    /// The time the pick was made for (buffered end, or playhead).
    pub target_time: f64,
    /// Issued purely to learn timing; its payload is discarded if the learned
    /// timing proves the pick wrong.
    pub is_sync_request: bool,
}

/// Mutable per-in-flight-request record, owned exclusively by one loader.
///
/// Folded into the authoritative segment/playlist state on success and
/// dropped at any terminal state.
#[derive(Clone, Debug)]
pub struct SegmentRequestInfo {
    pub playlist: PlaylistId,
    pub request: NextRequest,
    pub timeline: Timeline,
    /// Timestamp-offset decision for this load; `None` reuses the timeline's
    /// existing mapping.
    pub timestamp_offset: Option<f64>,
    pub video_timing_info: Option<TimingInfo>,
    pub audio_timing_info: Option<TimingInfo>,
    pub bytes_received: u64,
}

impl SegmentRequestInfo {
    pub fn new(playlist: PlaylistId, request: NextRequest, timeline: Timeline) -> Self {
        Self {
            playlist,
            request,
            timeline,
            timestamp_offset: None,
            video_timing_info: None,
            audio_timing_info: None,
            bytes_received: 0,
        }
    }
}
