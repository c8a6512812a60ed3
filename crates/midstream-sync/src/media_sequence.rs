use std::collections::BTreeMap;

use midstream_playlist::Playlist;
use tracing::trace;

/// Presentation-time span of one media sequence, plus whether its bytes have
/// reached the buffer sink.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyncRange {
    pub start: f64,
    pub end: f64,
    pub appended: bool,
}

/// Low-level media-sequence → presentation-time index.
///
/// Rebuilt from every manifest snapshot and the current playhead. Once an
/// anchor survives a refresh (or an authoritative segment timing feeds the
/// walk) the index is considered reliable and shortcuts sync-point discovery
/// for the stable-stream case.
#[derive(Clone, Debug, Default)]
pub struct MediaSequenceSync {
    entries: BTreeMap<u64, SyncRange>,
    updates: u32,
    /// Anchored by refresh continuity or an authoritative timing fact,
    /// rather than by the initial playhead guess.
    anchored: bool,
}

impl MediaSequenceSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the index from a fresh playlist snapshot.
    ///
    /// The walk anchors, in order of preference: on an authoritative segment
    /// timing inside the new window, on an entry surviving from the previous
    /// snapshot, or (first time only) on the current playhead.
    pub fn update(&mut self, playlist: &Playlist, current_time: f64) {
        if playlist.is_empty() {
            return;
        }

        let anchor = self.pick_anchor(playlist, current_time);
        let (anchor_index, anchor_time) = anchor;

        // Playlist-relative start of segment 0.
        let mut start = anchor_time;
        for segment in &playlist.segments()[..anchor_index] {
            start -= segment.duration;
        }

        let mut next = BTreeMap::new();
        let mut cursor = start;
        for segment in playlist.segments() {
            // Authoritative timing wins over the declared-duration walk and
            // re-anchors the cursor so later entries do not drift.
            let (seg_start, seg_end) = match segment.timing() {
                Some(t) => (t.start, t.end),
                None => (cursor, cursor + segment.duration),
            };
            let appended = self
                .entries
                .get(&segment.media_sequence)
                .is_some_and(|e| e.appended);
            next.insert(
                segment.media_sequence,
                SyncRange {
                    start: seg_start,
                    end: seg_end,
                    appended,
                },
            );
            cursor = seg_end;
        }

        self.entries = next;
        self.updates += 1;

        trace!(
            entries = self.entries.len(),
            updates = self.updates,
            anchored = self.anchored,
            "media_sequence_sync::update"
        );
    }

    fn pick_anchor(&mut self, playlist: &Playlist, current_time: f64) -> (usize, f64) {
        // Authoritative timing fact inside the window.
        for (i, segment) in playlist.segments().iter().enumerate() {
            if let Some(t) = segment.timing() {
                self.anchored = true;
                return (i, t.start);
            }
        }

        // Continuity with the previous snapshot.
        for (i, segment) in playlist.segments().iter().enumerate() {
            if let Some(entry) = self.entries.get(&segment.media_sequence) {
                self.anchored = true;
                return (i, entry.start);
            }
        }

        // No continuity at all (first sight, or the window jumped clean past
        // everything we knew): fall back to the playhead guess.
        self.anchored = false;
        (0, current_time)
    }

    /// Whether the index can be trusted for exact sync-point discovery.
    pub fn is_reliable(&self) -> bool {
        self.anchored && !self.entries.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry whose span contains `time`.
    pub fn entry_for_time(&self, time: f64) -> Option<(u64, SyncRange)> {
        self.entries
            .iter()
            .find(|(_, e)| time >= e.start && time < e.end)
            .map(|(&msn, &e)| (msn, e))
    }

    pub fn time_for_sequence(&self, media_sequence: u64) -> Option<SyncRange> {
        self.entries.get(&media_sequence).copied()
    }

    pub fn mark_appended(&mut self, media_sequence: u64) {
        if let Some(e) = self.entries.get_mut(&media_sequence) {
            e.appended = true;
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.updates = 0;
        self.anchored = false;
    }
}
