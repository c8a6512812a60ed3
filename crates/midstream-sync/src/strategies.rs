use midstream_core::Timeline;
use midstream_playlist::Playlist;

use crate::controller::TrackFacts;

/// An assertion that a specific segment (or part) begins at a specific
/// presentation time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyncPoint {
    pub segment_index: usize,
    pub part_index: Option<usize>,
    pub time: f64,
}

/// Inputs common to every sync-point strategy.
#[derive(Clone, Copy, Debug)]
pub struct SyncQuery<'a> {
    pub playlist: &'a Playlist,
    pub duration: f64,
    pub current_timeline: Timeline,
    pub current_time: f64,
}

pub(crate) type StrategyFn = fn(&TrackFacts, &SyncQuery<'_>) -> Option<SyncPoint>;

/// Priority-ordered strategy list. Earlier entries win distance ties.
pub(crate) const STRATEGIES: &[(&str, StrategyFn)] = &[
    ("media-sequence", media_sequence_strategy),
    ("program-date-time", program_date_time_strategy),
    ("segment-timing", segment_timing_strategy),
    ("discontinuity", discontinuity_strategy),
    ("playlist-carry", playlist_carry_strategy),
];

/// Exact sync from the low-level media-sequence index, once it is reliable.
fn media_sequence_strategy(facts: &TrackFacts, query: &SyncQuery<'_>) -> Option<SyncPoint> {
    if !facts.msn_sync.is_reliable() {
        return None;
    }
    let (msn, entry) = facts.msn_sync.entry_for_time(query.current_time)?;
    let segment_index = query.playlist.index_of_sequence(msn)?;
    Some(SyncPoint {
        segment_index,
        part_index: None,
        time: entry.start,
    })
}

/// Correlate manifest wall-clock anchors through the learned
/// wall-clock → presentation mapping.
fn program_date_time_strategy(facts: &TrackFacts, query: &SyncQuery<'_>) -> Option<SyncPoint> {
    let mapping = facts.pdt_mapping?;

    let mut best: Option<(f64, SyncPoint)> = None;
    for (i, segment) in query.playlist.segments().iter().enumerate() {
        let Some(pdt) = segment.program_date_time else {
            continue;
        };
        let start = pdt + mapping;
        let distance = (start - query.current_time).abs();
        if best.is_none_or(|(d, _)| distance < d) {
            best = Some((
                distance,
                SyncPoint {
                    segment_index: i,
                    part_index: None,
                    time: start,
                },
            ));
        }
    }
    best.map(|(_, sp)| sp)
}

/// Previously observed authoritative segment timings still in the window.
fn segment_timing_strategy(_facts: &TrackFacts, query: &SyncQuery<'_>) -> Option<SyncPoint> {
    let mut best: Option<(f64, SyncPoint)> = None;
    for (i, segment) in query.playlist.segments().iter().enumerate() {
        let Some(timing) = segment.timing() else {
            continue;
        };
        let distance = (timing.start - query.current_time).abs();
        if best.is_none_or(|(d, _)| distance < d) {
            best = Some((
                distance,
                SyncPoint {
                    segment_index: i,
                    part_index: None,
                    time: timing.start,
                },
            ));
        }
    }
    best.map(|(_, sp)| sp)
}

/// Recorded start times of timeline boundaries present in the window.
fn discontinuity_strategy(facts: &TrackFacts, query: &SyncQuery<'_>) -> Option<SyncPoint> {
    let mut best: Option<(f64, SyncPoint)> = None;
    for (i, segment) in query.playlist.segments().iter().enumerate() {
        if !segment.discontinuity {
            continue;
        }
        let Some(&time) = facts.discontinuities.get(&segment.timeline) else {
            continue;
        };
        let distance = (time - query.current_time).abs();
        if best.is_none_or(|(d, _)| distance < d) {
            best = Some((
                distance,
                SyncPoint {
                    segment_index: i,
                    part_index: None,
                    time,
                },
            ));
        }
    }
    best.map(|(_, sp)| sp)
}

/// Sync info carried over from segments that expired out of the live window.
fn playlist_carry_strategy(facts: &TrackFacts, query: &SyncQuery<'_>) -> Option<SyncPoint> {
    let carried = facts.carried.get(&query.playlist.id)?;

    // Still inside the window: direct lookup.
    if let Some(index) = query.playlist.index_of_sequence(carried.media_sequence) {
        return Some(SyncPoint {
            segment_index: index,
            part_index: None,
            time: carried.time,
        });
    }

    // Expired just past the window edge: extrapolate onto the first segment.
    if carried.media_sequence + 1 == query.playlist.media_sequence {
        return Some(SyncPoint {
            segment_index: 0,
            part_index: None,
            time: carried.time + carried.duration,
        });
    }

    None
}
