#![forbid(unsafe_code)]

//! Per-track segment loading: the state machine that picks the next
//! segment/part, fetches it, reconciles its timing with the sync controller,
//! and commits it to the buffer sink.
//!
//! One loader instance exists per elementary track (primary, alternate
//! audio, subtitle). Loaders share a [`midstream_sync::SyncController`] and a
//! [`midstream_sync::TimelineChangeController`]; everything else they own
//! exclusively.

pub mod error;
pub mod events;
pub mod loader;
pub mod options;
pub mod profile;
pub mod request;
pub mod state;
pub mod subtitle;
pub mod traits;

pub use error::{LoaderError, LoaderResult};
pub use events::LoaderEvent;
pub use loader::{SegmentLoader, TickOutcome};
pub use options::LoaderOptions;
pub use profile::{AudioProfile, PrimaryProfile, TrackProfile};
pub use request::{NextRequest, SegmentRequestInfo};
pub use state::LoaderState;
pub use subtitle::{SubtitleCues, SubtitleLoader, SubtitleSink};
pub use traits::{
    AppendError, BufferSink, DemuxJob, DemuxOutput, Demuxer, FetchError, FetchRequest,
    FetchedPayload, KeyContext, SegmentFetcher, TrackInfo,
};
