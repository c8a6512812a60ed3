use std::{ops::Range, sync::OnceLock};

use midstream_core::{SegmentTiming, Timeline};
use url::Url;

/// Encryption key reference for a segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyRef {
    pub uri: Url,
    pub iv: Option<[u8; 16]>,
}

/// Container initialization-segment reference (fMP4 only).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitRef {
    pub uri: Url,
    pub byte_range: Option<Range<u64>>,
}

/// Sub-segment unit for low-latency streaming.
#[derive(Clone, Debug, PartialEq)]
pub struct Part {
    pub uri: Url,
    pub duration: f64,
    /// Whether the part starts with an independent frame (safe join point).
    pub independent: bool,
}

/// Parser-facing raw segment facts, before arena placement.
///
/// The manifest parser knows nothing about timelines or presentation time;
/// those are assigned when the segment lands in a [`crate::Playlist`].
#[derive(Clone, Debug)]
pub struct SegmentTemplate {
    pub uri: Url,
    pub duration: f64,
    pub discontinuity: bool,
    pub byte_range: Option<Range<u64>>,
    /// Wall-clock anchor in epoch seconds, when the manifest carries one.
    pub program_date_time: Option<f64>,
    pub key: Option<KeyRef>,
    pub init: Option<InitRef>,
    pub parts: Vec<Part>,
}

impl SegmentTemplate {
    pub fn new(uri: Url, duration: f64) -> Self {
        Self {
            uri,
            duration,
            discontinuity: false,
            byte_range: None,
            program_date_time: None,
            key: None,
            init: None,
            parts: Vec::new(),
        }
    }
}

/// One immutable segment record in a playlist arena.
///
/// Identified by its media-sequence number, which is stable across live
/// refreshes. The presentation timing fact is the only post-construction
/// write and it is write-once: later, lower-confidence estimates can never
/// displace a value the sync controller has committed.
#[derive(Debug)]
pub struct Segment {
    pub media_sequence: u64,
    pub uri: Url,
    pub duration: f64,
    pub discontinuity: bool,
    pub timeline: Timeline,
    pub byte_range: Option<Range<u64>>,
    pub program_date_time: Option<f64>,
    pub key: Option<KeyRef>,
    pub init: Option<InitRef>,
    pub parts: Vec<Part>,
    timing: OnceLock<SegmentTiming>,
}

impl Segment {
    pub(crate) fn from_template(
        template: SegmentTemplate,
        media_sequence: u64,
        timeline: Timeline,
    ) -> Self {
        Self {
            media_sequence,
            uri: template.uri,
            duration: template.duration,
            discontinuity: template.discontinuity,
            timeline,
            byte_range: template.byte_range,
            program_date_time: template.program_date_time,
            key: template.key,
            init: template.init,
            parts: template.parts,
            timing: OnceLock::new(),
        }
    }

    /// Authoritative presentation timing, once known.
    pub fn timing(&self) -> Option<SegmentTiming> {
        self.timing.get().copied()
    }

    /// Commit the presentation timing fact.
    ///
    /// Returns `false` when a value already exists; the existing value wins.
    pub fn set_timing(&self, timing: SegmentTiming) -> bool {
        self.timing.set(timing).is_ok()
    }

    pub(crate) fn carry_timing_from(&self, other: &Segment) {
        if let Some(timing) = other.timing() {
            let _ = self.timing.set(timing);
        }
    }

    /// Declared durations of all parts, or the full duration when the
    /// segment has no part structure.
    pub fn part_durations(&self) -> Vec<f64> {
        if self.parts.is_empty() {
            vec![self.duration]
        } else {
            self.parts.iter().map(|p| p.duration).collect()
        }
    }
}
