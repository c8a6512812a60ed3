//! Presentation-time range arithmetic.
//!
//! `TimeRanges` mirrors the buffered/seekable range lists exposed by a buffer
//! sink: ordered, non-overlapping, half-open `[start, end)` ranges in seconds.

/// One contiguous `[start, end)` span of presentation time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
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

/// Ordered, non-overlapping set of time ranges.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeRanges {
    ranges: Vec<TimeRange>,
}

impl TimeRanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        let mut out = Self::new();
        for &(start, end) in pairs {
            out.add(TimeRange::new(start, end));
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TimeRange> {
        self.ranges.iter()
    }

    pub fn first(&self) -> Option<TimeRange> {
        self.ranges.first().copied()
    }

    pub fn last(&self) -> Option<TimeRange> {
        self.ranges.last().copied()
    }

    /// Earliest buffered time, if any.
    pub fn start(&self) -> Option<f64> {
        self.ranges.first().map(|r| r.start)
    }

    /// Latest buffered time, if any.
    pub fn end(&self) -> Option<f64> {
        self.ranges.last().map(|r| r.end)
    }

    /// Insert a range, merging with any ranges it touches or overlaps.
    pub fn add(&mut self, range: TimeRange) {
        if range.end <= range.start {
            return;
        }

        let mut merged = range;
        let mut out: Vec<TimeRange> = Vec::with_capacity(self.ranges.len() + 1);
        let mut placed = false;

        for r in &self.ranges {
            if r.end < merged.start {
                out.push(*r);
            } else if r.start > merged.end {
                if !placed {
                    out.push(merged);
                    placed = true;
                }
                out.push(*r);
            } else {
                merged.start = merged.start.min(r.start);
                merged.end = merged.end.max(r.end);
            }
        }
        if !placed {
            out.push(merged);
        }
        self.ranges = out;
    }

    /// Remove `[start, end)` from the set, splitting ranges as needed.
    pub fn remove(&mut self, start: f64, end: f64) {
        if end <= start {
            return;
        }

        let mut out: Vec<TimeRange> = Vec::with_capacity(self.ranges.len() + 1);
        for r in &self.ranges {
            if r.end <= start || r.start >= end {
                out.push(*r);
                continue;
            }
            if r.start < start {
                out.push(TimeRange::new(r.start, start));
            }
            if r.end > end {
                out.push(TimeRange::new(end, r.end));
            }
        }
        self.ranges = out;
    }

    pub fn contains(&self, time: f64) -> bool {
        self.range_containing(time).is_some()
    }

    /// Range containing `time`, if buffered there.
    pub fn range_containing(&self, time: f64) -> Option<TimeRange> {
        self.ranges.iter().copied().find(|r| r.contains(time))
    }

    /// First range starting strictly after `time`.
    pub fn next_range_after(&self, time: f64) -> Option<TimeRange> {
        self.ranges.iter().copied().find(|r| r.start > time)
    }

    /// Seconds of contiguous buffer ahead of `time`.
    ///
    /// Zero when `time` is not inside any range.
    pub fn buffered_ahead_of(&self, time: f64) -> f64 {
        self.range_containing(time)
            .map_or(0.0, |r| (r.end - time).max(0.0))
    }

    /// Total buffered seconds across all ranges.
    pub fn total_duration(&self) -> f64 {
        self.ranges.iter().map(TimeRange::duration).sum()
    }
}

impl FromIterator<TimeRange> for TimeRanges {
    fn from_iter<I: IntoIterator<Item = TimeRange>>(iter: I) -> Self {
        let mut out = Self::new();
        for r in iter {
            out.add(r);
        }
        out
    }
}
