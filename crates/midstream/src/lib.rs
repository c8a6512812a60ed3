#![forbid(unsafe_code)]

//! midstream: an adaptive-streaming playback core.
//!
//! Given parsed manifests, this crate continuously chooses which rendition to
//! download from, schedules the right segments in the right order, reconciles
//! playlist-relative time with presentation time across discontinuities, and
//! recovers from stalls, bad seeks, and rendition failures, feeding a
//! downstream buffer sink it neither over- nor under-fills.
//!
//! Manifest parsing, demuxing/decryption, the buffer sink itself, and cue
//! rendering are collaborator traits supplied by the host (see
//! [`Collaborators`]); the decision engine lives here.

pub mod controller;
pub mod events;
pub mod options;
pub mod steering;

pub use controller::{
    Collaborators, EngineError, ExclusionOutcome, PlaylistController, PlaylistSource,
};
pub use events::{EngineEvent, EventEmitter};
pub use options::EngineOptions;
pub use steering::{ContentSteering, Pathway};

// The pieces hosts wire against, re-exported for one-stop imports.
pub use midstream_abr::{AbrOptions, Candidate, SwitchReason};
pub use midstream_core::{PlayheadView, TimeRange, TimeRanges, TrackType};
pub use midstream_loader::{
    AppendError, BufferSink, DemuxJob, DemuxOutput, Demuxer, FetchError, FetchRequest,
    FetchedPayload, KeyContext, LoaderOptions, SegmentFetcher, SubtitleCues, SubtitleSink,
    TrackInfo,
};
pub use midstream_playlist::{
    Playlist, PlaylistHeader, PlaylistId, Rendition, SegmentTemplate,
};
pub use midstream_watch::WatcherOptions;
