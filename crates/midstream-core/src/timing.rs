/// Timeline epoch identifier.
///
/// A discontinuity marker on a segment starts a new timeline. Presentation
/// time mappings are only valid within one timeline; crossing into another
/// requires a fresh timestamp offset.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Timeline(pub u64);

impl Timeline {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Container-reported media timing for one media type of a processed segment.
///
/// `start`/`end` are in the demuxer's shared per-media-type clock, not in
/// presentation time; the sync controller owns that translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimingInfo {
    pub start: f64,
    pub end: f64,
    /// Content prepended by GOP-fusion repair, in seconds. Zero when none.
    pub prepended: f64,
}

impl TimingInfo {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            prepended: 0.0,
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Authoritative presentation-time placement of a segment.
///
/// Written at most once per segment with high-confidence data; lower
/// confidence estimates never overwrite an existing value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentTiming {
    pub start: f64,
    pub end: f64,
}

impl SegmentTiming {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }
}
