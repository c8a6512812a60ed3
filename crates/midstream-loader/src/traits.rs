use std::{ops::Range, time::Duration};

use bytes::Bytes;
use midstream_core::{SegmentTiming, TimeRanges, TimingInfo, TrackType};
use thiserror::Error;
use url::Url;

// Fetch seam

/// One byte fetch: segment, part, key, or init segment.
#[derive(Clone, Debug)]
pub struct FetchRequest {
    pub uri: Url,
    pub byte_range: Option<Range<u64>>,
    pub timeout: Duration,
}

/// Completed fetch with its wall-clock cost (drives the bandwidth estimate).
#[derive(Clone, Debug)]
pub struct FetchedPayload {
    pub bytes: Bytes,
    pub round_trip: Duration,
    /// Served from a local cache; excluded from bandwidth estimation.
    pub from_cache: bool,
}

/// Network failure classes.
///
/// `Aborted` is never escalated; `Timeout` degrades the bandwidth estimate;
/// `Failure` surfaces to the orchestrator as an exclusion candidate.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("request aborted")]
    Aborted,
    #[error("request failed with status {status}")]
    Failure { status: u16 },
}

/// Byte-fetch collaborator.
///
/// Implementations are expected to content-address-cache keys and init
/// segments; the loader re-requests them per segment without further
/// deduplication.
#[expect(async_fn_in_trait)]
pub trait SegmentFetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchedPayload, FetchError>;
}

// Demux seam

/// Encryption context handed through to the demuxer/decryptor.
#[derive(Clone, Debug)]
pub struct KeyContext {
    pub key: Bytes,
    pub iv: Option<[u8; 16]>,
}

/// Everything the demuxer needs for one segment.
#[derive(Clone, Debug)]
pub struct DemuxJob {
    pub payload: Bytes,
    pub init: Option<Bytes>,
    pub key: Option<KeyContext>,
    /// Offset the demuxer applies to outgoing timestamps; only set on first
    /// load or a timeline crossing.
    pub timestamp_offset: Option<f64>,
}

/// Which elementary media the demuxer found.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TrackInfo {
    pub has_audio: bool,
    pub has_video: bool,
}

/// Demuxer result: normalized media plus per-type timing in a shared clock.
#[derive(Clone, Debug)]
pub struct DemuxOutput {
    pub track_info: TrackInfo,
    pub video_timing: Option<TimingInfo>,
    pub audio_timing: Option<TimingInfo>,
    pub media: Bytes,
}

/// Demux/decrypt collaborator, treated as an async function with a timing
/// contract. May be offloaded (e.g. to a worker) behind this seam.
#[expect(async_fn_in_trait)]
pub trait Demuxer: Send + Sync {
    async fn process(&self, job: DemuxJob) -> Result<DemuxOutput, String>;
}

// Buffer sink seam

/// Why an append was rejected.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AppendError {
    /// The append would overflow buffer capacity. Recoverable: evict back
    /// buffer and retry once.
    #[error("append would exceed buffer capacity")]
    CapacityExceeded,
    #[error("buffer sink failed: {0}")]
    Fatal(String),
}

/// Downstream buffer sink: one shared append queue per elementary type.
///
/// Only one loader writes to each queue, so ordering is the only exclusion
/// required. `timing` tells the sink where the bytes land in presentation
/// time; `buffered` reflects acknowledged appends.
#[expect(async_fn_in_trait)]
pub trait BufferSink: Send + Sync {
    async fn append(
        &self,
        track: TrackType,
        bytes: Bytes,
        timing: SegmentTiming,
    ) -> Result<(), AppendError>;

    fn buffered(&self, track: TrackType) -> TimeRanges;

    /// Evict `[start, end)` from a track's buffer.
    fn remove(&self, track: TrackType, start: f64, end: f64);

    /// Intersection across tracks, as the playhead experiences it.
    fn buffered_overall(&self) -> TimeRanges;
}
