use midstream_core::TrackType;
use midstream_playlist::PlaylistId;
use tokio::sync::broadcast;

use crate::SwitchReason;

/// Engine-level events exposed to the host.
#[derive(Clone, Debug)]
pub enum EngineEvent {
    TrackInfo {
        track: TrackType,
        has_audio: bool,
        has_video: bool,
    },
    TimingInfo {
        track: TrackType,
        start: f64,
        end: f64,
    },
    SyncInfoUpdate {
        track: TrackType,
    },
    Appended {
        track: TrackType,
        playlist: PlaylistId,
        media_sequence: u64,
        start: f64,
        end: f64,
    },
    BandwidthUpdate {
        bps: u64,
    },
    RenditionChanged {
        from: Option<PlaylistId>,
        to: PlaylistId,
        reason: SwitchReason,
    },
    PlaylistExcluded {
        playlist: PlaylistId,
        permanent: bool,
        retries: u32,
    },
    SteeringApplied {
        pathway: String,
    },
    /// The watcher corrected the playhead.
    PlayheadCorrected {
        from: f64,
        to: f64,
    },
    Ended,
    Error {
        message: String,
        fatal: bool,
    },
}

/// Broadcast fan-out for engine events.
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn emit_rendition_changed(
        &self,
        from: Option<PlaylistId>,
        to: PlaylistId,
        reason: SwitchReason,
    ) {
        self.emit(EngineEvent::RenditionChanged { from, to, reason });
    }

    pub fn emit_excluded(&self, playlist: PlaylistId, permanent: bool, retries: u32) {
        self.emit(EngineEvent::PlaylistExcluded {
            playlist,
            permanent,
            retries,
        });
    }

    pub fn emit_error(&self, message: impl Into<String>, fatal: bool) {
        self.emit(EngineEvent::Error {
            message: message.into(),
            fatal,
        });
    }

    pub fn emit_ended(&self) {
        self.emit(EngineEvent::Ended);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_receives_emitted_events() {
        let emitter = EventEmitter::new(16);
        let mut rx = emitter.subscribe();

        emitter.emit_ended();

        assert!(matches!(rx.try_recv(), Ok(EngineEvent::Ended)));
    }

    #[test]
    fn emit_without_subscribers_is_fine() {
        let emitter = EventEmitter::new(16);
        emitter.emit_error("no one listening", false);
    }
}
