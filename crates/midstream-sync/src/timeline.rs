use std::collections::HashMap;

use midstream_core::{Timeline, TrackType};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

/// One loader's intent (or completed act) of crossing timelines.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimelineChange {
    pub from: Timeline,
    pub to: Timeline,
}

/// Cross-loader timeline-crossing coordination.
///
/// The primary loader is the crossing authority: an alternate-audio loader
/// must not take a timestamp offset for a new timeline until the primary has
/// at least begun crossing into it. Loaders announce intent with
/// [`set_pending`](Self::set_pending), commit with
/// [`confirm`](Self::confirm), and wait on the watch channel.
#[derive(Debug)]
pub struct TimelineChangeController {
    state: Mutex<State>,
    tx: watch::Sender<u64>,
}

#[derive(Debug, Default)]
struct State {
    pending: HashMap<TrackType, TimelineChange>,
    current: HashMap<TrackType, TimelineChange>,
    generation: u64,
}

impl Default for TimelineChangeController {
    fn default() -> Self {
        Self::new()
    }
}

impl TimelineChangeController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            state: Mutex::new(State::default()),
            tx,
        }
    }

    pub fn pending(&self, track: TrackType) -> Option<TimelineChange> {
        self.state.lock().pending.get(&track).copied()
    }

    pub fn last(&self, track: TrackType) -> Option<TimelineChange> {
        self.state.lock().current.get(&track).copied()
    }

    /// Announce that `track` is about to cross.
    pub fn set_pending(&self, track: TrackType, change: TimelineChange) {
        let mut state = self.state.lock();
        if state.pending.get(&track) == Some(&change) {
            return;
        }
        debug!(track = %track, from = %change.from, to = %change.to, "timeline::pending");
        state.pending.insert(track, change);
        self.bump(&mut state);
    }

    /// Commit a crossing: the pending entry becomes the last change.
    pub fn confirm(&self, track: TrackType, change: TimelineChange) {
        let mut state = self.state.lock();
        state.pending.remove(&track);
        debug!(track = %track, from = %change.from, to = %change.to, "timeline::confirm");
        state.current.insert(track, change);
        self.bump(&mut state);
    }

    pub fn clear_pending(&self, track: TrackType) {
        let mut state = self.state.lock();
        if state.pending.remove(&track).is_some() {
            self.bump(&mut state);
        }
    }

    /// Forget everything (destructive loader reset).
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.pending.clear();
        state.current.clear();
        self.bump(&mut state);
    }

    /// Whether the crossing authority has begun (or finished) crossing into
    /// `to`. Dependent loaders gate their own crossing on this.
    pub fn authority_crossing_to(&self, to: Timeline) -> bool {
        let state = self.state.lock();
        let pending = state
            .pending
            .get(&TrackType::Primary)
            .is_some_and(|c| c.to == to);
        let done = state
            .current
            .get(&TrackType::Primary)
            .is_some_and(|c| c.to == to);
        pending || done
    }

    /// Subscribe to change notifications; pairs with
    /// [`authority_crossing_to`](Self::authority_crossing_to) for waiting.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    /// Block until the authority begins crossing into `to`.
    pub async fn wait_for_authority(&self, to: Timeline) {
        let mut rx = self.subscribe();
        loop {
            if self.authority_crossing_to(to) {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    fn bump(&self, state: &mut State) {
        state.generation += 1;
        let _ = self.tx.send(state.generation);
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;

    #[test]
    fn pending_then_confirm_moves_the_change() {
        let tlc = TimelineChangeController::new();
        let change = TimelineChange {
            from: Timeline(0),
            to: Timeline(1),
        };

        tlc.set_pending(TrackType::Primary, change);
        assert_eq!(tlc.pending(TrackType::Primary), Some(change));
        assert_eq!(tlc.last(TrackType::Primary), None);

        tlc.confirm(TrackType::Primary, change);
        assert_eq!(tlc.pending(TrackType::Primary), None);
        assert_eq!(tlc.last(TrackType::Primary), Some(change));
    }

    #[test]
    fn authority_gate_tracks_primary_only() {
        let tlc = TimelineChangeController::new();
        let change = TimelineChange {
            from: Timeline(0),
            to: Timeline(1),
        };

        // An audio announcement does not open the gate.
        tlc.set_pending(TrackType::AlternateAudio, change);
        assert!(!tlc.authority_crossing_to(Timeline(1)));

        tlc.set_pending(TrackType::Primary, change);
        assert!(tlc.authority_crossing_to(Timeline(1)));
        assert!(!tlc.authority_crossing_to(Timeline(2)));

        // Still open after the primary commits.
        tlc.confirm(TrackType::Primary, change);
        assert!(tlc.authority_crossing_to(Timeline(1)));
    }

    #[tokio::test]
    async fn audio_waits_until_primary_begins_crossing() {
        let tlc = Arc::new(TimelineChangeController::new());
        let change = TimelineChange {
            from: Timeline(0),
            to: Timeline(1),
        };

        let waiter = {
            let tlc = Arc::clone(&tlc);
            tokio::spawn(async move { tlc.wait_for_authority(Timeline(1)).await })
        };

        // Give the waiter a chance to park; it must not complete yet.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        tlc.set_pending(TrackType::Primary, change);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter must wake after primary announces")
            .unwrap();
    }

    #[test]
    fn reset_clears_both_maps() {
        let tlc = TimelineChangeController::new();
        let change = TimelineChange {
            from: Timeline(0),
            to: Timeline(1),
        };
        tlc.set_pending(TrackType::Primary, change);
        tlc.confirm(TrackType::Primary, change);
        tlc.set_pending(TrackType::AlternateAudio, change);

        tlc.reset();

        assert_eq!(tlc.pending(TrackType::Primary), None);
        assert_eq!(tlc.pending(TrackType::AlternateAudio), None);
        assert_eq!(tlc.last(TrackType::Primary), None);
    }
}
