//! Shared fakes for loader tests: scripted fetcher/demuxer, an in-memory
//! buffer sink, and a controllable playhead.

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use midstream_core::{PlayheadView, SegmentTiming, TimeRange, TimeRanges, TimingInfo, TrackType};
use midstream_loader::{
    AppendError, BufferSink, DemuxJob, DemuxOutput, Demuxer, FetchError, FetchRequest,
    FetchedPayload, SegmentFetcher, SubtitleCues, SubtitleSink, TrackInfo,
};
use parking_lot::Mutex;

// Fetcher

/// Scripted fetcher: pops a response per call, falling back to a default
/// 100 kB / 200 ms payload.
#[derive(Default)]
pub struct FakeFetcher {
    script: Mutex<VecDeque<Result<FetchedPayload, FetchError>>>,
    pub requests: Mutex<Vec<FetchRequest>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: Result<FetchedPayload, FetchError>) {
        self.script.lock().push_back(response);
    }

    pub fn ok_payload() -> FetchedPayload {
        FetchedPayload {
            bytes: Bytes::from(vec![0u8; 100_000]),
            round_trip: Duration::from_millis(200),
            from_cache: false,
        }
    }
}

impl SegmentFetcher for FakeFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchedPayload, FetchError> {
        self.requests.lock().push(request);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Self::ok_payload()))
    }
}

// Demuxer

/// Scripted demuxer: pops an output per call.
#[derive(Default)]
pub struct FakeDemuxer {
    script: Mutex<VecDeque<Result<DemuxOutput, String>>>,
}

impl FakeDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_timing(&self, start: f64, end: f64) {
        self.script.lock().push_back(Ok(output_with(start, end)));
    }

    pub fn push_error(&self, message: &str) {
        self.script.lock().push_back(Err(message.to_string()));
    }
}

pub fn output_with(start: f64, end: f64) -> DemuxOutput {
    DemuxOutput {
        track_info: TrackInfo {
            has_audio: true,
            has_video: true,
        },
        video_timing: Some(TimingInfo::new(start, end)),
        audio_timing: Some(TimingInfo::new(start, end)),
        media: Bytes::from_static(b"media"),
    }
}

impl Demuxer for FakeDemuxer {
    async fn process(&self, _job: DemuxJob) -> Result<DemuxOutput, String> {
        self.script
            .lock()
            .pop_front()
            .expect("demuxer script exhausted")
    }
}

// Buffer sink

/// In-memory sink tracking buffered ranges per track, with scripted append
/// rejections and recorded evictions.
#[derive(Default)]
pub struct FakeSink {
    ranges: Mutex<HashMap<TrackType, TimeRanges>>,
    rejections: Mutex<VecDeque<AppendError>>,
    pub removed: Mutex<Vec<(TrackType, f64, f64)>>,
    pub appended: Mutex<Vec<(TrackType, SegmentTiming)>>,
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_next(&self, error: AppendError) {
        self.rejections.lock().push_back(error);
    }

    pub fn seed(&self, track: TrackType, start: f64, end: f64) {
        self.ranges
            .lock()
            .entry(track)
            .or_default()
            .add(TimeRange::new(start, end));
    }
}

impl BufferSink for FakeSink {
    async fn append(
        &self,
        track: TrackType,
        _bytes: Bytes,
        timing: SegmentTiming,
    ) -> Result<(), AppendError> {
        if let Some(err) = self.rejections.lock().pop_front() {
            return Err(err);
        }
        self.ranges
            .lock()
            .entry(track)
            .or_default()
            .add(TimeRange::new(timing.start, timing.end));
        self.appended.lock().push((track, timing));
        Ok(())
    }

    fn buffered(&self, track: TrackType) -> TimeRanges {
        self.ranges.lock().get(&track).cloned().unwrap_or_default()
    }

    fn remove(&self, track: TrackType, start: f64, end: f64) {
        self.removed.lock().push((track, start, end));
        if let Some(ranges) = self.ranges.lock().get_mut(&track) {
            ranges.remove(start, end);
        }
    }

    fn buffered_overall(&self) -> TimeRanges {
        self.buffered(TrackType::Primary)
    }
}

// Playhead

/// Controllable playhead for tests.
pub struct FakePlayhead {
    time: Mutex<f64>,
    started: AtomicBool,
    pub seeks: Mutex<Vec<f64>>,
}

impl FakePlayhead {
    pub fn new(time: f64) -> Arc<Self> {
        Arc::new(Self {
            time: Mutex::new(time),
            started: AtomicBool::new(true),
            seeks: Mutex::new(Vec::new()),
        })
    }

    pub fn not_started(time: f64) -> Arc<Self> {
        let playhead = Self::new(time);
        playhead.started.store(false, Ordering::Relaxed);
        playhead
    }

    pub fn set_time(&self, time: f64) {
        *self.time.lock() = time;
    }
}

impl PlayheadView for FakePlayhead {
    fn current_time(&self) -> f64 {
        *self.time.lock()
    }

    fn seekable(&self) -> TimeRanges {
        TimeRanges::new()
    }

    fn buffered(&self) -> TimeRanges {
        TimeRanges::new()
    }

    fn paused(&self) -> bool {
        false
    }

    fn has_started_playing(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }

    fn seek_to(&self, time: f64) {
        self.seeks.lock().push(time);
    }
}

// Subtitle sink

#[derive(Default)]
pub struct FakeSubtitleSink {
    pub delivered: Mutex<Vec<SubtitleCues>>,
}

impl FakeSubtitleSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubtitleSink for FakeSubtitleSink {
    fn deliver(&self, cues: SubtitleCues) {
        self.delivered.lock().push(cues);
    }
}
