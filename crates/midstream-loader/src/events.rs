use midstream_core::TrackType;
use midstream_playlist::PlaylistId;

use crate::traits::TrackInfo;

/// Loader → orchestrator notifications.
///
/// Sent over an unbounded channel; the controller folds them into the
/// engine-level event stream and reacts (codec checks, ABR re-evaluation).
#[derive(Clone, Debug, PartialEq)]
pub enum LoaderEvent {
    /// First track-info discovery for a load.
    TrackInfo {
        track: TrackType,
        playlist: PlaylistId,
        info: TrackInfo,
    },
    /// Authoritative presentation timing established for a segment.
    TimingInfo {
        track: TrackType,
        start: f64,
        end: f64,
    },
    /// Bytes committed to the sink.
    Appended {
        track: TrackType,
        playlist: PlaylistId,
        media_sequence: u64,
        start: f64,
        end: f64,
    },
    /// Sync facts changed (new mapping, probe result, reset).
    SyncInfoUpdate { track: TrackType },
    /// A completed request produced a bandwidth sample.
    BandwidthUpdate { bps: u64 },
    /// The loader walked off the end of a VOD playlist.
    Ended { track: TrackType },
}
