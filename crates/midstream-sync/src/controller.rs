use std::collections::HashMap;

use midstream_core::{SegmentTiming, Timeline, TimingInfo, TrackType};
use midstream_playlist::{Playlist, PlaylistId, Segment};
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::{
    media_sequence::MediaSequenceSync,
    strategies::{STRATEGIES, SyncPoint, SyncQuery},
};

/// Sync info carried over from a segment that expired out of a live window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CarriedSync {
    pub media_sequence: u64,
    pub time: f64,
    pub duration: f64,
}

/// Per-track learned timing facts.
///
/// Each loader writes only its own track's entry; the controller itself is
/// shared across loaders of one presentation.
#[derive(Debug, Default)]
pub struct TrackFacts {
    /// timeline → mapping, where `presentation = media_time + mapping`.
    pub(crate) timeline_mappings: HashMap<Timeline, f64>,
    /// timeline → presentation start of its first segment.
    pub(crate) discontinuities: HashMap<Timeline, f64>,
    /// `presentation = program_date_time + mapping`, once learned.
    pub(crate) pdt_mapping: Option<f64>,
    pub(crate) carried: HashMap<PlaylistId, CarriedSync>,
    pub(crate) msn_sync: MediaSequenceSync,
}

/// How a segment's media timing gets translated to presentation time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MappingSource {
    /// Explicit timestamp-offset assignment: first load or timeline crossing.
    TimestampOffset(f64),
    /// Reuse the mapping already recorded for the segment's timeline.
    Existing,
}

/// Shared timeline-synchronization state for one presentation.
///
/// On-demand content always resolves through the trivial zero-point walk;
/// live content runs the strategy list and the candidate closest to the
/// requested time wins (ties broken by strategy priority).
#[derive(Debug, Default)]
pub struct SyncController {
    tracks: RwLock<HashMap<TrackType, TrackFacts>>,
}

impl SyncController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Best known sync point for `current_time`, or `None` when nothing can
    /// anchor the playlist yet (callers then issue a sync request).
    pub fn get_sync_point(
        &self,
        track: TrackType,
        playlist: &Playlist,
        duration: f64,
        current_timeline: Timeline,
        current_time: f64,
    ) -> Option<SyncPoint> {
        if duration.is_finite() && playlist.end_list {
            // The zero-point walk: playlist-relative time zero is
            // presentation time zero.
            let pos = playlist.position_for_time(0, 0.0, current_time.max(0.0), 0.0)?;
            return Some(SyncPoint {
                segment_index: pos.segment_index,
                part_index: pos.part_index,
                time: pos.start_time,
            });
        }

        let tracks = self.tracks.read();
        // Strategies that read only the playlist still run before this track
        // has learned anything.
        let fresh = TrackFacts::default();
        let facts = tracks.get(&track).unwrap_or(&fresh);
        let query = SyncQuery {
            playlist,
            duration,
            current_timeline,
            current_time,
        };

        let mut best: Option<(f64, &'static str, SyncPoint)> = None;
        for (name, strategy) in STRATEGIES {
            let Some(candidate) = strategy(facts, &query) else {
                continue;
            };
            let distance = (candidate.time - current_time).abs();
            // Strictly-less keeps the higher-priority strategy on ties.
            if best.is_none_or(|(d, _, _)| distance < d) {
                best = Some((distance, name, candidate));
            }
        }

        if let Some((distance, name, sync_point)) = best {
            trace!(
                track = %track,
                strategy = name,
                distance,
                segment_index = sync_point.segment_index,
                time = sync_point.time,
                "sync_controller::get_sync_point"
            );
            Some(sync_point)
        } else {
            None
        }
    }

    /// Rebuild the low-level media-sequence index after a refresh.
    pub fn update_media_sequence_sync(
        &self,
        track: TrackType,
        playlist: &Playlist,
        current_time: f64,
    ) {
        let mut tracks = self.tracks.write();
        tracks
            .entry(track)
            .or_default()
            .msn_sync
            .update(playlist, current_time);
    }

    pub fn mark_appended(&self, track: TrackType, media_sequence: u64) {
        let mut tracks = self.tracks.write();
        tracks
            .entry(track)
            .or_default()
            .msn_sync
            .mark_appended(media_sequence);
    }

    /// Carry the timing of segments that rolled off the live window so later
    /// sync-point queries can still anchor near the window start.
    pub fn save_expired_segment_info(&self, track: TrackType, old: &Playlist, new: &Playlist) {
        let mut last: Option<CarriedSync> = None;
        for msn in old.media_sequence..new.media_sequence {
            let Some(segment) = old.segment_for_sequence(msn) else {
                continue;
            };
            if let Some(timing) = segment.timing() {
                last = Some(CarriedSync {
                    media_sequence: msn,
                    time: timing.start,
                    duration: segment.duration,
                });
            }
        }

        if let Some(carried) = last {
            debug!(
                track = %track,
                playlist = %new.id,
                media_sequence = carried.media_sequence,
                time = carried.time,
                "sync_controller::save_expired_segment_info"
            );
            let mut tracks = self.tracks.write();
            tracks.entry(track).or_default().carried.insert(new.id, carried);
        }
    }

    /// Translate a just-demuxed segment's media timing into authoritative
    /// presentation timing.
    ///
    /// With a [`MappingSource::TimestampOffset`] the timeline's mapping is
    /// (re)recorded; with [`MappingSource::Existing`] the segment can only be
    /// placed if its timeline has been crossed before. The segment's `start`
    /// is written at most once; an existing value always wins.
    pub fn calculate_segment_time_mapping(
        &self,
        track: TrackType,
        segment: &Segment,
        timing: &TimingInfo,
        source: MappingSource,
    ) -> Option<SegmentTiming> {
        let mut tracks = self.tracks.write();
        let facts = tracks.entry(track).or_default();

        let mapping = match source {
            MappingSource::TimestampOffset(offset) => {
                let mapping = offset - timing.start;
                facts.timeline_mappings.insert(segment.timeline, mapping);
                debug!(
                    track = %track,
                    timeline = %segment.timeline,
                    mapping,
                    "sync_controller::record_timeline_mapping"
                );
                mapping
            }
            MappingSource::Existing => *facts.timeline_mappings.get(&segment.timeline)?,
        };

        let placed = SegmentTiming::new(timing.start + mapping, timing.end + mapping);
        segment.set_timing(placed);
        // The committed value (an earlier write may have won).
        let committed = segment.timing().unwrap_or(placed);

        if segment.discontinuity {
            facts
                .discontinuities
                .entry(segment.timeline)
                .or_insert(committed.start);
        }
        if let Some(pdt) = segment.program_date_time
            && facts.pdt_mapping.is_none()
        {
            facts.pdt_mapping = Some(committed.start - pdt);
        }

        Some(committed)
    }

    /// Mapping recorded for a timeline, if it has been crossed.
    pub fn mapping_for(&self, track: TrackType, timeline: Timeline) -> Option<f64> {
        self.tracks
            .read()
            .get(&track)
            .and_then(|f| f.timeline_mappings.get(&timeline).copied())
    }

    /// Whether the low-level index can anchor this track without a probe.
    pub fn has_reliable_sync(&self, track: TrackType) -> bool {
        self.tracks
            .read()
            .get(&track)
            .is_some_and(|f| f.msn_sync.is_reliable())
    }

    /// Forget everything learned for one track (full loader reset).
    pub fn reset_track(&self, track: TrackType) {
        let mut tracks = self.tracks.write();
        if tracks.remove(&track).is_some() {
            debug!(track = %track, "sync_controller::reset_track");
        }
    }
}
