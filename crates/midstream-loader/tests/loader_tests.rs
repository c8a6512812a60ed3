//! Segment-loader behavior: pick gating, probe discards, timeline ordering,
//! failure recovery.

mod fixtures;

use std::{sync::Arc, time::Duration};

use fixtures::{FakeDemuxer, FakeFetcher, FakePlayhead, FakeSink};
use midstream_abr::SharedEstimator;
use midstream_core::TrackType;
use midstream_loader::{
    AppendError, AudioProfile, FetchError, LoaderError, LoaderEvent, LoaderOptions, LoaderState,
    PrimaryProfile, SegmentLoader, TickOutcome,
};
use midstream_playlist::{Playlist, PlaylistHeader, PlaylistId, SegmentTemplate};
use midstream_sync::{SyncController, TimelineChangeController};
use tokio::sync::mpsc;
use url::Url;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

fn header(id: u64, media_sequence: u64, end_list: bool) -> PlaylistHeader {
    PlaylistHeader {
        id: PlaylistId(id),
        uri: url("https://cdn.example.com/media.m3u8"),
        target_duration: 6.0,
        part_target_duration: None,
        media_sequence,
        discontinuity_sequence: 0,
        end_list,
    }
}

fn templates(count: usize, first: usize) -> Vec<SegmentTemplate> {
    (0..count)
        .map(|i| {
            SegmentTemplate::new(
                url(&format!("https://cdn.example.com/s{}.ts", first + i)),
                6.0,
            )
        })
        .collect()
}

struct Harness {
    fetcher: Arc<FakeFetcher>,
    demuxer: Arc<FakeDemuxer>,
    sink: Arc<FakeSink>,
    sync: Arc<SyncController>,
    timeline_changes: Arc<TimelineChangeController>,
    estimator: Arc<SharedEstimator>,
    playhead: Arc<FakePlayhead>,
    events_rx: mpsc::UnboundedReceiver<LoaderEvent>,
    events_tx: mpsc::UnboundedSender<LoaderEvent>,
}

impl Harness {
    fn new(playhead: Arc<FakePlayhead>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            fetcher: Arc::new(FakeFetcher::new()),
            demuxer: Arc::new(FakeDemuxer::new()),
            sink: Arc::new(FakeSink::new()),
            sync: Arc::new(SyncController::new()),
            timeline_changes: Arc::new(TimelineChangeController::new()),
            estimator: Arc::new(SharedEstimator::new()),
            playhead,
            events_rx,
            events_tx,
        }
    }

    fn primary(&self) -> SegmentLoader<PrimaryProfile, FakeFetcher, FakeDemuxer, FakeSink> {
        SegmentLoader::new(
            PrimaryProfile,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.demuxer),
            Arc::clone(&self.sink),
            Arc::clone(&self.sync),
            Arc::clone(&self.timeline_changes),
            Arc::clone(&self.estimator),
            self.playhead.clone(),
            self.events_tx.clone(),
            LoaderOptions::default(),
        )
    }

    fn audio(&self) -> SegmentLoader<AudioProfile, FakeFetcher, FakeDemuxer, FakeSink> {
        SegmentLoader::new(
            AudioProfile,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.demuxer),
            Arc::clone(&self.sink),
            Arc::clone(&self.sync),
            Arc::clone(&self.timeline_changes),
            Arc::clone(&self.estimator),
            self.playhead.clone(),
            self.events_tx.clone(),
            LoaderOptions::default(),
        )
    }

    fn drain_events(&mut self) -> Vec<LoaderEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = self.events_rx.try_recv() {
            out.push(ev);
        }
        out
    }
}

#[tokio::test]
async fn vod_loads_sequentially_from_zero() {
    let mut h = Harness::new(FakePlayhead::new(0.0));
    let mut loader = h.primary();
    loader.update_playlist(Arc::new(Playlist::new(header(1, 0, true), templates(10, 0))));

    // Media clock starts at 10.0; the first load pins it to presentation 0.
    h.demuxer.push_timing(10.0, 16.0);
    let outcome = loader.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Loaded {
            media_sequence: 0,
            start: 0.0,
            end: 6.0
        }
    );
    assert_eq!(loader.state(), LoaderState::Ready);
    assert_eq!(loader.media_index(), Some(0));

    // Second pick walks forward and reuses the recorded mapping.
    h.demuxer.push_timing(16.0, 22.0);
    let outcome = loader.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Loaded {
            media_sequence: 1,
            start: 6.0,
            end: 12.0
        }
    );

    let events = h.drain_events();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, LoaderEvent::Appended { media_sequence: 1, .. }))
    );
    assert!(
        events
            .iter()
            .any(|e| matches!(e, LoaderEvent::BandwidthUpdate { .. }))
    );
}

#[tokio::test]
async fn startup_guard_stops_after_one_second_buffered() {
    let h = Harness::new(FakePlayhead::not_started(0.0));
    let mut loader = h.primary();
    loader.update_playlist(Arc::new(Playlist::new(header(1, 0, true), templates(10, 0))));

    h.sink.seed(TrackType::Primary, 0.0, 1.5);
    assert!(loader.choose_next_request().is_none());
    assert_eq!(loader.tick().await.unwrap(), TickOutcome::Idle);
}

#[tokio::test]
async fn goal_buffer_gates_the_monitor() {
    let h = Harness::new(FakePlayhead::new(0.0));
    let mut loader = h.primary();
    loader.update_playlist(Arc::new(Playlist::new(header(1, 0, true), templates(10, 0))));

    // 30s of forward buffer at playtime 0 is exactly the goal.
    h.sink.seed(TrackType::Primary, 0.0, 30.0);
    assert!(loader.choose_next_request().is_none());
    assert_eq!(loader.tick().await.unwrap(), TickOutcome::Idle);
}

#[tokio::test]
async fn wrong_sync_probe_is_discarded_and_never_appended() {
    let mut h = Harness::new(FakePlayhead::new(0.0));
    let mut loader = h.primary();

    // Live stream, first sight: the first pick is a probe that pins itself
    // via the timestamp offset, so it confirms and appends.
    let live = Arc::new(Playlist::new(header(1, 100, false), templates(5, 0)));
    loader.update_playlist(Arc::clone(&live));
    h.demuxer.push_timing(100.0, 106.0);
    let outcome = loader.tick().await.unwrap();
    assert!(matches!(outcome, TickOutcome::Loaded { .. }));

    // The window jumps clean past everything known: no sync point survives,
    // but the timeline mapping does.
    let (jumped, _) = live.merge_refresh(header(1, 110, false), templates(5, 10));
    loader.update_playlist(Arc::new(jumped));
    assert_eq!(loader.media_index(), None);

    // The probe guesses segment 1 for target 6.0; the learned timing places
    // the bytes at 66.0, proving the guess wrong.
    h.demuxer.push_timing(166.0, 172.0);
    let outcome = loader.tick().await.unwrap();
    assert_eq!(outcome, TickOutcome::SyncProbeDiscarded);

    // No duplicate append: the sink still holds only the first segment.
    let appended = h.sink.appended.lock();
    assert_eq!(appended.len(), 1);
    drop(appended);

    let _ = h.drain_events();
}

#[tokio::test]
async fn refresh_retargets_the_walk_by_media_sequence() {
    let h = Harness::new(FakePlayhead::new(0.0));
    let mut loader = h.primary();

    let live = Arc::new(Playlist::new(header(1, 100, false), templates(5, 0)));
    loader.update_playlist(Arc::clone(&live));

    // Load msn 100 and msn 101.
    h.demuxer.push_timing(0.0, 6.0);
    loader.tick().await.unwrap();
    h.demuxer.push_timing(6.0, 12.0);
    loader.tick().await.unwrap();
    assert_eq!(loader.media_index(), Some(1));

    // One segment expires: the appended index must keep naming msn 101.
    let (refreshed, _) = live.merge_refresh(header(1, 101, false), templates(5, 1));
    loader.update_playlist(Arc::new(refreshed));
    assert_eq!(loader.media_index(), Some(0));

    // And the next pick continues with msn 102, not a duplicate.
    let next = loader.choose_next_request().unwrap();
    assert_eq!(next.media_sequence, 102);
    assert_eq!(next.segment_index, 1);
}

#[tokio::test]
async fn audio_waits_for_primary_across_discontinuity() {
    let mut h = Harness::new(FakePlayhead::new(0.0));
    let mut primary = h.primary();
    let mut audio = h.audio();

    let mut tpls = templates(3, 0);
    tpls[1].discontinuity = true;
    let playlist = Arc::new(Playlist::new(header(1, 0, true), tpls));
    primary.update_playlist(Arc::clone(&playlist));

    let mut audio_tpls = templates(3, 0);
    audio_tpls[1].discontinuity = true;
    let audio_playlist = Arc::new(Playlist::new(header(2, 0, true), audio_tpls));
    audio.update_playlist(Arc::clone(&audio_playlist));

    // Audio cannot even enter timeline 0 before the primary does.
    assert_eq!(
        audio.tick().await.unwrap(),
        TickOutcome::WaitingOnTimeline
    );
    assert_eq!(audio.state(), LoaderState::WaitingOnTimeline);

    // Primary crosses into timeline 0; audio may follow.
    h.demuxer.push_timing(0.0, 6.0);
    assert!(matches!(
        primary.tick().await.unwrap(),
        TickOutcome::Loaded { .. }
    ));
    h.demuxer.push_timing(0.0, 6.0);
    assert!(matches!(
        audio.tick().await.unwrap(),
        TickOutcome::Loaded { .. }
    ));

    // Primary is still on timeline 0, so audio holds at the discontinuity.
    assert_eq!(
        audio.tick().await.unwrap(),
        TickOutcome::WaitingOnTimeline
    );

    // Primary crosses the discontinuity into timeline 1...
    h.demuxer.push_timing(0.0, 6.0);
    assert!(matches!(
        primary.tick().await.unwrap(),
        TickOutcome::Loaded { .. }
    ));

    // ...and only now does audio get a timeline-1 timestamp offset.
    h.demuxer.push_timing(0.0, 6.0);
    let outcome = audio.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Loaded {
            media_sequence: 1,
            start: 6.0,
            end: 12.0
        }
    );

    let _ = h.drain_events();
}

#[tokio::test]
async fn timeout_depresses_bandwidth_and_recovers_locally() {
    let h = Harness::new(FakePlayhead::new(0.0));
    let mut loader = h.primary();
    loader.update_playlist(Arc::new(Playlist::new(header(1, 0, true), templates(10, 0))));

    // Seed a healthy estimate.
    h.estimator.push_sample(midstream_abr::ThroughputSample {
        bytes: 1_000_000,
        duration: Duration::from_secs(1),
        at: web_time::Instant::now(),
        source: midstream_abr::SampleSource::Network,
    });
    let healthy = h.estimator.estimate_bps().unwrap();

    h.fetcher
        .push(Err(FetchError::Timeout(Duration::from_secs(8))));
    let outcome = loader.tick().await.unwrap();

    // Local recovery: back to Ready, no escalation, estimate depressed.
    assert_eq!(outcome, TickOutcome::Idle);
    assert_eq!(loader.state(), LoaderState::Ready);
    assert!(h.estimator.estimate_bps().unwrap() < healthy / 4);
}

#[tokio::test]
async fn abort_is_a_no_op_recovery() {
    let h = Harness::new(FakePlayhead::new(0.0));
    let mut loader = h.primary();
    loader.update_playlist(Arc::new(Playlist::new(header(1, 0, true), templates(10, 0))));

    h.fetcher.push(Err(FetchError::Aborted));
    let outcome = loader.tick().await.unwrap();
    assert_eq!(outcome, TickOutcome::Idle);
    assert_eq!(loader.state(), LoaderState::Ready);
}

#[tokio::test]
async fn http_failure_escalates_for_exclusion() {
    let h = Harness::new(FakePlayhead::new(0.0));
    let mut loader = h.primary();
    loader.update_playlist(Arc::new(Playlist::new(header(1, 0, true), templates(10, 0))));

    h.fetcher.push(Err(FetchError::Failure { status: 404 }));
    let err = loader.tick().await.unwrap_err();
    match err {
        LoaderError::Fetch { playlist, source } => {
            assert_eq!(playlist, PlaylistId(1));
            assert_eq!(source, FetchError::Failure { status: 404 });
        }
        other => panic!("expected fetch escalation, got {other:?}"),
    }
    assert_eq!(loader.state(), LoaderState::Ready);
}

#[tokio::test]
async fn append_overflow_evicts_back_buffer_and_retries_once() {
    let h = Harness::new(FakePlayhead::new(20.0));
    let mut loader = h.primary();
    loader.update_playlist(Arc::new(Playlist::new(header(1, 0, true), templates(10, 0))));

    h.sink.seed(TrackType::Primary, 0.0, 20.5);
    h.sink.reject_next(AppendError::CapacityExceeded);
    h.demuxer.push_timing(20.5, 26.5);

    let outcome = loader.tick().await.unwrap();
    assert!(matches!(outcome, TickOutcome::Loaded { .. }));

    // Eviction kept 10s of back buffer behind the 20s playhead.
    let removed = h.sink.removed.lock();
    assert_eq!(removed.len(), 1);
    let (track, start, end) = removed[0];
    assert_eq!(track, TrackType::Primary);
    assert_eq!(start, 0.0);
    assert!((end - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn append_overflow_twice_is_fatal_for_the_rendition() {
    let h = Harness::new(FakePlayhead::new(20.0));
    let mut loader = h.primary();
    loader.update_playlist(Arc::new(Playlist::new(header(1, 0, true), templates(10, 0))));

    h.sink.seed(TrackType::Primary, 0.0, 20.5);
    h.sink.reject_next(AppendError::CapacityExceeded);
    h.sink.reject_next(AppendError::CapacityExceeded);
    h.demuxer.push_timing(20.5, 26.5);

    let err = loader.tick().await.unwrap_err();
    assert!(matches!(err, LoaderError::AppendOverflow { .. }));
}

#[tokio::test]
async fn vod_end_is_reported_once() {
    let mut h = Harness::new(FakePlayhead::new(0.0));
    let mut loader = h.primary();
    loader.update_playlist(Arc::new(Playlist::new(header(1, 0, true), templates(2, 0))));

    h.demuxer.push_timing(0.0, 6.0);
    loader.tick().await.unwrap();
    h.demuxer.push_timing(6.0, 12.0);
    loader.tick().await.unwrap();

    // Keep the playhead behind the goal so the monitor still runs.
    h.playhead.set_time(11.0);
    assert_eq!(loader.tick().await.unwrap(), TickOutcome::EndOfStream);
    assert_eq!(loader.tick().await.unwrap(), TickOutcome::Idle);

    let events = h.drain_events();
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, LoaderEvent::Ended { .. }))
            .count(),
        1
    );
}

#[tokio::test]
async fn demux_failure_escalates() {
    let h = Harness::new(FakePlayhead::new(0.0));
    let mut loader = h.primary();
    loader.update_playlist(Arc::new(Playlist::new(header(1, 0, true), templates(10, 0))));

    h.demuxer.push_error("unsupported container");
    let err = loader.tick().await.unwrap_err();
    assert!(matches!(err, LoaderError::Demux { .. }));
    assert_eq!(loader.state(), LoaderState::Ready);
}

#[tokio::test]
async fn pause_and_reset_behave() {
    let mut h = Harness::new(FakePlayhead::new(0.0));
    let mut loader = h.primary();
    loader.update_playlist(Arc::new(Playlist::new(header(1, 0, true), templates(10, 0))));

    loader.pause();
    assert_eq!(loader.tick().await.unwrap(), TickOutcome::Idle);
    loader.resume();

    h.demuxer.push_timing(0.0, 6.0);
    assert!(matches!(
        loader.tick().await.unwrap(),
        TickOutcome::Loaded { .. }
    ));

    loader.reset();
    assert_eq!(loader.media_index(), None);
    assert!(!h.sync.has_reliable_sync(TrackType::Primary));

    let _ = h.drain_events();
}
