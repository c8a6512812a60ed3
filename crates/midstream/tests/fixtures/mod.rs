//! Fakes for engine-level tests: scripted collaborators plus an in-memory
//! playlist source.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use midstream::{
    AppendError, BufferSink, DemuxJob, DemuxOutput, Demuxer, FetchError, FetchRequest,
    FetchedPayload, PlayheadView, Playlist, PlaylistHeader, PlaylistId, PlaylistSource, Rendition,
    SegmentFetcher, SegmentTemplate, SubtitleCues, SubtitleSink, TrackInfo, TrackType,
};
use midstream_core::{SegmentTiming, TimeRange, TimeRanges, TimingInfo};
use parking_lot::Mutex;
use url::Url;

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub fn header(id: u64, media_sequence: u64, end_list: bool) -> PlaylistHeader {
    PlaylistHeader {
        id: PlaylistId(id),
        uri: url(&format!("https://cdn.example.com/v{id}.m3u8")),
        target_duration: 6.0,
        part_target_duration: None,
        media_sequence,
        discontinuity_sequence: 0,
        end_list,
    }
}

pub fn templates(count: usize, first: usize) -> Vec<SegmentTemplate> {
    (0..count)
        .map(|i| {
            SegmentTemplate::new(
                url(&format!("https://cdn.example.com/s{}.ts", first + i)),
                6.0,
            )
        })
        .collect()
}

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
}

impl SegmentFetcher for FakeFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchedPayload, FetchError> {
        self.requests.lock().push(request);
        self.script.lock().pop_front().unwrap_or_else(|| {
            Ok(FetchedPayload {
                bytes: Bytes::from(vec![0u8; 100_000]),
                round_trip: Duration::from_millis(200),
                from_cache: false,
            })
        })
    }
}

#[derive(Default)]
pub struct FakeDemuxer {
    script: Mutex<VecDeque<Result<DemuxOutput, String>>>,
    /// When the script is empty, synthesize 6s segments continuing from the
    /// last media time.
    auto_cursor: Mutex<f64>,
}

impl FakeDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_timing(&self, start: f64, end: f64) {
        self.script.lock().push_back(Ok(output_with(start, end)));
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
        if let Some(scripted) = self.script.lock().pop_front() {
            return scripted;
        }
        let mut cursor = self.auto_cursor.lock();
        let start = *cursor;
        *cursor += 6.0;
        Ok(output_with(start, start + 6.0))
    }
}

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

    pub fn set_time(&self, time: f64) {
        *self.time.lock() = time;
    }
}

impl PlayheadView for FakePlayhead {
    fn current_time(&self) -> f64 {
        *self.time.lock()
    }

    fn seekable(&self) -> TimeRanges {
        TimeRanges::from_pairs(&[(0.0, 600.0)])
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

/// In-memory manifest source keyed by rendition id.
#[derive(Default)]
pub struct FakeSource {
    playlists: Mutex<HashMap<PlaylistId, (PlaylistHeader, Vec<SegmentTemplate>)>>,
    fail_loads: Mutex<HashSet<PlaylistId>>,
    pub loads: Mutex<Vec<PlaylistId>>,
    pub refreshes: Mutex<u32>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: PlaylistId, header: PlaylistHeader, templates: Vec<SegmentTemplate>) {
        self.playlists.lock().insert(id, (header, templates));
    }

    pub fn fail_load(&self, id: PlaylistId) {
        self.fail_loads.lock().insert(id);
    }
}

impl PlaylistSource for FakeSource {
    async fn load(
        &self,
        rendition: &Rendition,
    ) -> Result<(PlaylistHeader, Vec<SegmentTemplate>), String> {
        self.loads.lock().push(rendition.id);
        if self.fail_loads.lock().contains(&rendition.id) {
            return Err(format!("load failed for {}", rendition.id));
        }
        self.playlists
            .lock()
            .get(&rendition.id)
            .cloned()
            .ok_or_else(|| format!("unknown rendition {}", rendition.id))
    }

    async fn refresh(
        &self,
        playlist: &Playlist,
    ) -> Result<(PlaylistHeader, Vec<SegmentTemplate>), String> {
        *self.refreshes.lock() += 1;
        self.playlists
            .lock()
            .get(&playlist.id)
            .cloned()
            .ok_or_else(|| format!("unknown playlist {}", playlist.id))
    }
}
