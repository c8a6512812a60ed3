use std::{collections::HashMap, sync::Arc};

use midstream_core::Timeline;
use tracing::debug;
use url::Url;

use crate::segment::{Segment, SegmentTemplate};

/// Stable identifier of one rendition's media playlist.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct PlaylistId(pub u64);

impl std::fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "playlist-{}", self.0)
    }
}

/// Parser-facing playlist-level facts.
#[derive(Clone, Debug)]
pub struct PlaylistHeader {
    pub id: PlaylistId,
    pub uri: Url,
    pub target_duration: f64,
    /// Partial-segment target duration; present only for low-latency streams.
    pub part_target_duration: Option<f64>,
    /// Media-sequence number of the first segment.
    pub media_sequence: u64,
    /// Timeline epoch of the first segment.
    pub discontinuity_sequence: u64,
    /// End-of-list flag: `true` for VOD, `false` for live.
    pub end_list: bool,
}

/// Result of merging a refreshed snapshot over the previous one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshStats {
    /// Segments that rolled off the front of the live window.
    pub expired: u64,
    /// Segments appended at the live edge.
    pub added: u64,
}

/// Location of a target time within a playlist's segment/part structure.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MediaPosition {
    pub segment_index: usize,
    pub part_index: Option<usize>,
    /// Playlist-relative start time of the located segment or part.
    pub start_time: f64,
}

/// One rendition's media playlist: an arena of immutable segment records
/// indexed by position and by media sequence.
///
/// A live refresh never mutates an existing playlist; [`Playlist::merge_refresh`]
/// produces a new snapshot that carries forward every timing fact already
/// learned for overlapping media sequences.
#[derive(Debug)]
pub struct Playlist {
    pub id: PlaylistId,
    pub uri: Url,
    pub target_duration: f64,
    pub part_target_duration: Option<f64>,
    pub media_sequence: u64,
    pub discontinuity_sequence: u64,
    pub end_list: bool,
    segments: Vec<Arc<Segment>>,
    by_sequence: HashMap<u64, usize>,
}

impl Playlist {
    pub fn new(header: PlaylistHeader, templates: Vec<SegmentTemplate>) -> Self {
        let mut timeline = Timeline(header.discontinuity_sequence);
        let mut segments = Vec::with_capacity(templates.len());
        let mut by_sequence = HashMap::with_capacity(templates.len());

        for (i, template) in templates.into_iter().enumerate() {
            if template.discontinuity {
                timeline = timeline.next();
            }
            let media_sequence = header.media_sequence + i as u64;
            by_sequence.insert(media_sequence, i);
            segments.push(Arc::new(Segment::from_template(
                template,
                media_sequence,
                timeline,
            )));
        }

        Self {
            id: header.id,
            uri: header.uri,
            target_duration: header.target_duration,
            part_target_duration: header.part_target_duration,
            media_sequence: header.media_sequence,
            discontinuity_sequence: header.discontinuity_sequence,
            end_list: header.end_list,
            segments,
            by_sequence,
        }
    }

    /// Build the next snapshot from a refreshed parse, preserving known
    /// timing facts by media-sequence alignment.
    pub fn merge_refresh(
        &self,
        header: PlaylistHeader,
        templates: Vec<SegmentTemplate>,
    ) -> (Playlist, RefreshStats) {
        let next = Playlist::new(header, templates);

        for segment in &next.segments {
            if let Some(prev) = self.segment_for_sequence(segment.media_sequence) {
                segment.carry_timing_from(prev);
            }
        }

        let expired = next.media_sequence.saturating_sub(self.media_sequence);
        let old_last = self.media_sequence + self.segments.len() as u64;
        let new_last = next.media_sequence + next.segments.len() as u64;
        let stats = RefreshStats {
            expired,
            added: new_last.saturating_sub(old_last),
        };

        debug!(
            playlist = %next.id,
            expired = stats.expired,
            added = stats.added,
            "playlist::merge_refresh"
        );

        (next, stats)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_live(&self) -> bool {
        !self.end_list
    }

    pub fn segments(&self) -> &[Arc<Segment>] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> Option<&Arc<Segment>> {
        self.segments.get(index)
    }

    pub fn last_segment(&self) -> Option<&Arc<Segment>> {
        self.segments.last()
    }

    /// Arena slot for a media-sequence number, if still in the window.
    pub fn index_of_sequence(&self, media_sequence: u64) -> Option<usize> {
        self.by_sequence.get(&media_sequence).copied()
    }

    pub fn segment_for_sequence(&self, media_sequence: u64) -> Option<&Arc<Segment>> {
        self.index_of_sequence(media_sequence)
            .and_then(|i| self.segments.get(i))
    }

    /// Presentation duration: finite for VOD, infinite while live.
    pub fn duration(&self) -> f64 {
        if self.end_list {
            self.total_declared_duration()
        } else {
            f64::INFINITY
        }
    }

    /// Sum of declared segment durations.
    pub fn total_declared_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Timeline of the segment at `index`, when in range.
    pub fn timeline_of(&self, index: usize) -> Option<Timeline> {
        self.segments.get(index).map(|s| s.timeline)
    }

    /// Map a target time onto a segment (and part, for low-latency tails) by
    /// walking declared durations from a known anchor.
    ///
    /// `fudge` absorbs the mismatch between declared and actual durations so
    /// that a target within `fudge` of a boundary does not select the
    /// following segment. Returns `None` when the target lies past the end of
    /// the walk.
    pub fn position_for_time(
        &self,
        anchor_index: usize,
        anchor_time: f64,
        target: f64,
        fudge: f64,
    ) -> Option<MediaPosition> {
        if self.segments.is_empty() || anchor_index >= self.segments.len() {
            return None;
        }

        // Walk back to the playlist-relative start of segment 0 so a target
        // before the anchor resolves the same way as one after it.
        let mut start = anchor_time;
        for segment in &self.segments[..anchor_index] {
            start -= segment.duration;
        }

        if target < start {
            // Clamped: times before the window map to its first segment.
            return Some(MediaPosition {
                segment_index: 0,
                part_index: None,
                start_time: start,
            });
        }

        let mut cursor = start;
        for (i, segment) in self.segments.iter().enumerate() {
            let end = cursor + segment.duration;
            if target < end - fudge {
                return Some(self.descend_into_parts(i, cursor, target));
            }
            cursor = end;
        }

        // Within fudge of the very end still lands on the last segment.
        if target < cursor + fudge {
            let last = self.segments.len() - 1;
            let last_start = cursor - self.segments[last].duration;
            return Some(self.descend_into_parts(last, last_start, target));
        }

        None
    }

    fn descend_into_parts(&self, index: usize, segment_start: f64, target: f64) -> MediaPosition {
        let segment = &self.segments[index];
        if segment.parts.is_empty() || self.part_target_duration.is_none() {
            return MediaPosition {
                segment_index: index,
                part_index: None,
                start_time: segment_start,
            };
        }

        let mut cursor = segment_start;
        for (j, part) in segment.parts.iter().enumerate() {
            let end = cursor + part.duration;
            if target < end || j == segment.parts.len() - 1 {
                return MediaPosition {
                    segment_index: index,
                    part_index: Some(j),
                    start_time: cursor,
                };
            }
            cursor = end;
        }

        MediaPosition {
            segment_index: index,
            part_index: None,
            start_time: segment_start,
        }
    }
}
