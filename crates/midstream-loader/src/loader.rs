use std::sync::Arc;

use midstream_abr::{SampleSource, SharedEstimator, ThroughputSample};
use midstream_core::{PlayheadView, SegmentTiming, Timeline, TrackType};
use midstream_playlist::{MediaPosition, Playlist, PlaylistId, Segment};
use midstream_sync::{MappingSource, SyncController, TimelineChange, TimelineChangeController};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use web_time::Instant;

use crate::{
    error::{LoaderError, LoaderResult},
    events::LoaderEvent,
    options::LoaderOptions,
    profile::TrackProfile,
    request::{NextRequest, SegmentRequestInfo},
    state::LoaderState,
    traits::{
        AppendError, BufferSink, DemuxJob, Demuxer, FetchError, FetchRequest, KeyContext,
        SegmentFetcher,
    },
};

/// What one monitor pass did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    /// Nothing to do: at goal, paused, or no playlist.
    Idle,
    /// Holding a cross-timeline pick until the authority begins crossing.
    WaitingOnTimeline,
    /// A segment/part was fetched, timed, and committed to the sink.
    Loaded {
        media_sequence: u64,
        start: f64,
        end: f64,
    },
    /// A sync probe learned timing but targeted the wrong segment; its
    /// payload was discarded.
    SyncProbeDiscarded,
    /// The loader walked off the end of a VOD playlist.
    EndOfStream,
}

/// The per-track segment-loading state machine.
///
/// Generic over its collaborators and a [`TrackProfile`] that supplies the
/// few per-track differences. Driven by an external monitor cadence: the
/// orchestrator calls [`tick`](Self::tick) roughly twice a second while the
/// loader is under its buffer goal.
pub struct SegmentLoader<P, F, D, B> {
    profile: P,
    fetcher: Arc<F>,
    demuxer: Arc<D>,
    sink: Arc<B>,
    sync: Arc<SyncController>,
    timeline_changes: Arc<TimelineChangeController>,
    estimator: Arc<SharedEstimator>,
    playhead: Arc<dyn PlayheadView>,
    events: mpsc::UnboundedSender<LoaderEvent>,
    options: LoaderOptions,

    state: LoaderState,
    playlist: Option<Arc<Playlist>>,
    /// Last appended segment index within the current playlist snapshot.
    media_index: Option<usize>,
    /// Last appended part index within that segment, when it has parts.
    part_index: Option<usize>,
    current_timeline: Option<Timeline>,
    pending: Option<SegmentRequestInfo>,
    paused: bool,
    has_fallback: bool,
    ended_notified: bool,
}

impl<P, F, D, B> SegmentLoader<P, F, D, B>
where
    P: TrackProfile,
    F: SegmentFetcher,
    D: Demuxer,
    B: BufferSink,
{
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        profile: P,
        fetcher: Arc<F>,
        demuxer: Arc<D>,
        sink: Arc<B>,
        sync: Arc<SyncController>,
        timeline_changes: Arc<TimelineChangeController>,
        estimator: Arc<SharedEstimator>,
        playhead: Arc<dyn PlayheadView>,
        events: mpsc::UnboundedSender<LoaderEvent>,
        options: LoaderOptions,
    ) -> Self {
        Self {
            profile,
            fetcher,
            demuxer,
            sink,
            sync,
            timeline_changes,
            estimator,
            playhead,
            events,
            options,
            state: LoaderState::Init,
            playlist: None,
            media_index: None,
            part_index: None,
            current_timeline: None,
            pending: None,
            paused: false,
            has_fallback: true,
            ended_notified: false,
        }
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn track(&self) -> TrackType {
        self.profile.track()
    }

    pub fn playlist(&self) -> Option<&Arc<Playlist>> {
        self.playlist.as_ref()
    }

    pub fn media_index(&self) -> Option<usize> {
        self.media_index
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
        if self.state == LoaderState::Init && self.playlist.is_some() {
            self.state = LoaderState::Ready;
        }
    }

    /// Whether the controller still has somewhere to fall back to; shortens
    /// request timeouts when it does not.
    pub fn set_has_fallback(&mut self, has_fallback: bool) {
        self.has_fallback = has_fallback;
    }

    /// Install a playlist snapshot: the initial one, a live refresh of the
    /// same rendition, or a (non-destructive) rendition retarget.
    pub fn update_playlist(&mut self, playlist: Arc<Playlist>) {
        if self.state.is_disposed() {
            return;
        }

        let current_time = self.playhead.current_time();

        if let Some(old) = self.playlist.take() {
            if old.id == playlist.id {
                // Refresh: retarget the appended index by media sequence so
                // it keeps naming the same segment.
                if let Some(index) = self.media_index {
                    let sequence = old.segment(index).map(|s| s.media_sequence);
                    self.media_index =
                        sequence.and_then(|msn| playlist.index_of_sequence(msn));
                    if self.media_index.is_none() {
                        // Rolled out of the window: next pick re-syncs.
                        self.part_index = None;
                    }
                }
                self.sync
                    .save_expired_segment_info(self.track(), &old, &playlist);
            } else {
                // Rendition switch: keep buffered data, re-anchor the index
                // by media sequence where the new rendition aligns.
                debug!(
                    track = %self.track(),
                    from = %old.id,
                    to = %playlist.id,
                    "segment_loader::retarget"
                );
                self.state = LoaderState::SwitchingMedia;
                self.media_index = self
                    .media_index
                    .and_then(|i| old.segment(i))
                    .map(|s| s.media_sequence)
                    .and_then(|msn| playlist.index_of_sequence(msn));
                self.part_index = None;
                self.pending = None;
            }
        }

        self.sync
            .update_media_sequence_sync(self.track(), &playlist, current_time);
        let _ = self.events.send(LoaderEvent::SyncInfoUpdate {
            track: self.track(),
        });

        self.playlist = Some(playlist);
        self.ended_notified = false;
        if matches!(self.state, LoaderState::Init | LoaderState::SwitchingMedia) && !self.paused {
            self.state = LoaderState::Ready;
        }
    }

    /// Cancel in-flight work and return to `Ready`.
    pub fn abort(&mut self) {
        if self.state.is_disposed() {
            return;
        }
        self.pending = None;
        if matches!(
            self.state,
            LoaderState::Waiting | LoaderState::Appending | LoaderState::WaitingOnTimeline
        ) {
            self.state = LoaderState::Ready;
        }
    }

    /// Abort plus forget this track's learned sync facts; the next pick
    /// starts from a fresh sync point.
    pub fn reset(&mut self) {
        self.abort();
        self.media_index = None;
        self.part_index = None;
        self.current_timeline = None;
        self.sync.reset_track(self.track());
        self.timeline_changes.clear_pending(self.track());
        let _ = self.events.send(LoaderEvent::SyncInfoUpdate {
            track: self.track(),
        });
    }

    pub fn dispose(&mut self) {
        self.pending = None;
        self.playlist = None;
        self.state = LoaderState::Disposed;
    }

    /// Decide the next segment/part to request, if any.
    ///
    /// Pure with respect to loader state: returns `None` at goal buffer,
    /// under the startup guard, when paused, or past the end of the walk.
    pub fn choose_next_request(&self) -> Option<NextRequest> {
        if self.paused || !self.state.can_pick() {
            return None;
        }
        let playlist = self.playlist.as_deref()?;
        if playlist.is_empty() {
            return None;
        }

        let current_time = self.playhead.current_time();
        let buffered = self.sink.buffered(self.profile.buffers_into());
        let forward = buffered
            .end()
            .map_or(0.0, |end| (end - current_time).max(0.0));
        let goal = self.options.goal_buffer.at(current_time);

        if forward >= goal {
            return None;
        }
        if !self.playhead.has_started_playing() && forward >= self.options.startup_min_buffered {
            return None;
        }

        let target_time = buffered.end().unwrap_or(current_time);

        if let Some(prev) = self.media_index {
            return self.walk_forward(playlist, prev, target_time);
        }

        let duration = playlist.duration();
        let timeline = self.current_timeline.unwrap_or_default();
        if let Some(sp) =
            self.sync
                .get_sync_point(self.track(), playlist, duration, timeline, target_time)
        {
            let pos = playlist.position_for_time(
                sp.segment_index,
                sp.time,
                target_time,
                self.options.boundary_fudge,
            )?;
            let segment = playlist.segment(pos.segment_index)?;
            return Some(NextRequest {
                segment_index: pos.segment_index,
                part_index: pos.part_index,
                media_sequence: segment.media_sequence,
                start_of_segment: pos.start_time,
                target_time,
                is_sync_request: false,
            });
        }

        // No usable sync point: issue a probe purely to learn timing. The
        // declared-duration walk from the window start is the best guess.
        let pos = playlist
            .position_for_time(0, 0.0, target_time.max(0.0), self.options.boundary_fudge)
            .unwrap_or_else(|| {
                // Past the walk: guess the live edge.
                let last = playlist.len() - 1;
                MediaPosition {
                    segment_index: last,
                    part_index: None,
                    start_time: target_time,
                }
            });
        let segment = playlist.segment(pos.segment_index)?;
        Some(NextRequest {
            segment_index: pos.segment_index,
            part_index: pos.part_index,
            media_sequence: segment.media_sequence,
            start_of_segment: pos.start_time,
            target_time,
            is_sync_request: true,
        })
    }

    fn walk_forward(
        &self,
        playlist: &Playlist,
        prev: usize,
        target_time: f64,
    ) -> Option<NextRequest> {
        // Part-level advance inside the current segment.
        if let (Some(part), Some(segment)) = (self.part_index, playlist.segment(prev))
            && part + 1 < segment.parts.len()
        {
            let base = segment
                .timing()
                .map_or(target_time, |t| t.start);
            let offset: f64 = segment.parts[..=part].iter().map(|p| p.duration).sum();
            return Some(NextRequest {
                segment_index: prev,
                part_index: Some(part + 1),
                media_sequence: segment.media_sequence,
                start_of_segment: base + offset,
                target_time,
                is_sync_request: false,
            });
        }

        let next = prev + 1;
        let segment = playlist.segment(next)?;
        let start = segment
            .timing()
            .map(|t| t.start)
            .or_else(|| playlist.segment(prev).and_then(|p| p.timing()).map(|t| t.end))
            .unwrap_or(target_time);
        let part_index = (!segment.parts.is_empty()).then_some(0);
        Some(NextRequest {
            segment_index: next,
            part_index,
            media_sequence: segment.media_sequence,
            start_of_segment: start,
            target_time,
            is_sync_request: false,
        })
    }

    /// One monitor pass: pick, fetch, time, append.
    pub async fn tick(&mut self) -> LoaderResult<TickOutcome> {
        if self.state.is_disposed() {
            return Err(LoaderError::Disposed);
        }
        if !self.state.can_pick() {
            return Ok(TickOutcome::Idle);
        }

        let Some(request) = self.choose_next_request() else {
            if self.at_vod_end() && !self.ended_notified {
                self.ended_notified = true;
                let _ = self.events.send(LoaderEvent::Ended {
                    track: self.track(),
                });
                return Ok(TickOutcome::EndOfStream);
            }
            return Ok(TickOutcome::Idle);
        };

        self.load(request).await
    }

    async fn load(&mut self, request: NextRequest) -> LoaderResult<TickOutcome> {
        let Some(playlist) = self.playlist.clone() else {
            return Ok(TickOutcome::Idle);
        };
        let Some(segment) = playlist.segment(request.segment_index) else {
            return Ok(TickOutcome::Idle);
        };
        let playlist_id = playlist.id;

        // Timeline-crossing bookkeeping. The timestamp offset only changes
        // on first load or a crossing, and dependents hold until the
        // authority has begun crossing.
        let crossing = self.current_timeline != Some(segment.timeline);
        let timestamp_offset = if crossing {
            let change = TimelineChange {
                from: self.current_timeline.unwrap_or(segment.timeline),
                to: segment.timeline,
            };
            self.timeline_changes.set_pending(self.track(), change);

            if !self.profile.selects_timestamp_offset()
                && !self.timeline_changes.authority_crossing_to(segment.timeline)
            {
                trace!(
                    track = %self.track(),
                    timeline = %segment.timeline,
                    "segment_loader::waiting_on_timeline"
                );
                self.state = LoaderState::WaitingOnTimeline;
                return Ok(TickOutcome::WaitingOnTimeline);
            }

            Some(self.timestamp_offset_for(&request))
        } else {
            None
        };

        let mut info = SegmentRequestInfo::new(playlist_id, request, segment.timeline);
        info.timestamp_offset = timestamp_offset;
        self.state = LoaderState::Waiting;
        self.pending = Some(info);

        let timeout = self
            .options
            .request_timeout(segment.duration, self.has_fallback);

        // Optional key and init fetches; both content-address-cacheable by
        // the fetcher, so re-requesting per segment is cheap.
        let key = match self.fetch_key(playlist_id, segment, timeout).await {
            Ok(key) => key,
            Err(outcome) => return outcome,
        };
        let init = match self.fetch_init(playlist_id, segment, timeout).await {
            Ok(init) => init,
            Err(outcome) => return outcome,
        };

        let uri = match request.part_index.and_then(|p| segment.parts.get(p)) {
            Some(part) => part.uri.clone(),
            None => segment.uri.clone(),
        };
        let byte_range = if request.part_index.is_some() {
            None
        } else {
            segment.byte_range.clone()
        };
        let fetched = match self
            .fetcher
            .fetch(FetchRequest {
                uri,
                byte_range,
                timeout,
            })
            .await
        {
            Ok(payload) => payload,
            Err(err) => return self.handle_fetch_error(playlist_id, err),
        };

        if let Some(pending) = self.pending.as_mut() {
            pending.bytes_received = fetched.bytes.len() as u64;
        }
        self.record_bandwidth(&fetched);

        // Demux.
        let output = match self
            .demuxer
            .process(DemuxJob {
                payload: fetched.bytes,
                init,
                key,
                timestamp_offset,
            })
            .await
        {
            Ok(output) => output,
            Err(message) => {
                self.finish_request(LoaderState::Ready);
                return Err(LoaderError::Demux {
                    playlist: playlist_id,
                    message,
                });
            }
        };

        let _ = self.events.send(LoaderEvent::TrackInfo {
            track: self.track(),
            playlist: playlist_id,
            info: output.track_info,
        });

        let Some(timing) = self.profile.confirms_timing(&output) else {
            self.finish_request(LoaderState::Ready);
            return Err(LoaderError::Demux {
                playlist: playlist_id,
                message: "no usable timing info in payload".into(),
            });
        };
        if let Some(pending) = self.pending.as_mut() {
            pending.video_timing_info = output.video_timing;
            pending.audio_timing_info = output.audio_timing;
        }

        // Translate media timing into authoritative presentation timing.
        let source = match timestamp_offset {
            Some(offset) => MappingSource::TimestampOffset(offset),
            None => MappingSource::Existing,
        };
        let Some(placed) =
            self.sync
                .calculate_segment_time_mapping(self.track(), segment, &timing, source)
        else {
            // No mapping for this timeline yet; discard and retry once the
            // authority has established one.
            warn!(
                track = %self.track(),
                timeline = %segment.timeline,
                "segment_loader::unplaceable_segment"
            );
            self.finish_request(LoaderState::Ready);
            return Ok(TickOutcome::Idle);
        };
        let _ = self.events.send(LoaderEvent::SyncInfoUpdate {
            track: self.track(),
        });
        let _ = self.events.send(LoaderEvent::TimingInfo {
            track: self.track(),
            start: placed.start,
            end: placed.end,
        });

        // A sync probe is only appendable if the learned timing confirms the
        // pick; otherwise its bytes are silently dropped and the next pick
        // uses the corrected facts.
        if request.is_sync_request && !self.probe_confirmed(&playlist, &request, placed) {
            debug!(
                track = %self.track(),
                requested = request.segment_index,
                start = placed.start,
                "segment_loader::sync_probe_discarded"
            );
            self.finish_request(LoaderState::Ready);
            return Ok(TickOutcome::SyncProbeDiscarded);
        }

        // Commit to the sink.
        self.state = LoaderState::Appending;
        if let Err(err) = self
            .append_with_eviction(playlist_id, segment, output.media, placed)
            .await
        {
            self.finish_request(LoaderState::Ready);
            return Err(err);
        }

        // Fold the request into authoritative state.
        self.media_index = Some(request.segment_index);
        self.part_index = request.part_index;
        if crossing {
            self.timeline_changes.confirm(
                self.track(),
                TimelineChange {
                    from: self.current_timeline.unwrap_or(segment.timeline),
                    to: segment.timeline,
                },
            );
        }
        self.current_timeline = Some(segment.timeline);
        self.sync.mark_appended(self.track(), segment.media_sequence);
        self.finish_request(LoaderState::Ready);

        let _ = self.events.send(LoaderEvent::Appended {
            track: self.track(),
            playlist: playlist_id,
            media_sequence: segment.media_sequence,
            start: placed.start,
            end: placed.end,
        });

        Ok(TickOutcome::Loaded {
            media_sequence: segment.media_sequence,
            start: placed.start,
            end: placed.end,
        })
    }

    fn timestamp_offset_for(&self, request: &NextRequest) -> f64 {
        // Continue from buffered content when it exists; otherwise pin the
        // segment where the walk predicted it.
        self.sink
            .buffered(self.profile.buffers_into())
            .end()
            .unwrap_or_else(|| request.start_of_segment.max(0.0))
    }

    fn probe_confirmed(
        &self,
        playlist: &Playlist,
        request: &NextRequest,
        placed: SegmentTiming,
    ) -> bool {
        // With the learned start as anchor, re-map the original target: the
        // pick was right iff it still lands on the requested segment.
        playlist
            .position_for_time(
                request.segment_index,
                placed.start,
                request.target_time,
                self.options.boundary_fudge,
            )
            .is_some_and(|pos| pos.segment_index == request.segment_index)
    }

    async fn append_with_eviction(
        &mut self,
        playlist_id: PlaylistId,
        segment: &Arc<Segment>,
        media: bytes::Bytes,
        placed: SegmentTiming,
    ) -> LoaderResult<()> {
        let track = self.profile.buffers_into();

        match self.sink.append(track, media.clone(), placed).await {
            Ok(()) => Ok(()),
            Err(AppendError::Fatal(message)) => Err(LoaderError::SinkFatal(message)),
            Err(AppendError::CapacityExceeded) => {
                // Bounded local recovery: evict the evictable back buffer and
                // retry exactly once.
                let current_time = self.playhead.current_time();
                let keep_from = (current_time - self.options.back_buffer_secs).max(0.0);
                warn!(
                    track = %track,
                    keep_from,
                    media_sequence = segment.media_sequence,
                    "segment_loader::evicting_back_buffer"
                );
                self.sink.remove(track, 0.0, keep_from);

                match self.sink.append(track, media, placed).await {
                    Ok(()) => Ok(()),
                    Err(AppendError::Fatal(message)) => Err(LoaderError::SinkFatal(message)),
                    Err(AppendError::CapacityExceeded) => Err(LoaderError::AppendOverflow {
                        playlist: playlist_id,
                    }),
                }
            }
        }
    }

    async fn fetch_key(
        &mut self,
        playlist_id: PlaylistId,
        segment: &Arc<Segment>,
        timeout: std::time::Duration,
    ) -> Result<Option<KeyContext>, LoaderResult<TickOutcome>> {
        let Some(key_ref) = &segment.key else {
            return Ok(None);
        };
        match self
            .fetcher
            .fetch(FetchRequest {
                uri: key_ref.uri.clone(),
                byte_range: None,
                timeout,
            })
            .await
        {
            Ok(payload) => Ok(Some(KeyContext {
                key: payload.bytes,
                iv: key_ref.iv,
            })),
            Err(err) => Err(self.handle_fetch_error(playlist_id, err)),
        }
    }

    async fn fetch_init(
        &mut self,
        playlist_id: PlaylistId,
        segment: &Arc<Segment>,
        timeout: std::time::Duration,
    ) -> Result<Option<bytes::Bytes>, LoaderResult<TickOutcome>> {
        let Some(init_ref) = &segment.init else {
            return Ok(None);
        };
        match self
            .fetcher
            .fetch(FetchRequest {
                uri: init_ref.uri.clone(),
                byte_range: init_ref.byte_range.clone(),
                timeout,
            })
            .await
        {
            Ok(payload) => Ok(Some(payload.bytes)),
            Err(err) => Err(self.handle_fetch_error(playlist_id, err)),
        }
    }

    fn handle_fetch_error(
        &mut self,
        playlist: PlaylistId,
        err: FetchError,
    ) -> LoaderResult<TickOutcome> {
        match err {
            FetchError::Aborted => {
                // No-op recovery.
                self.finish_request(LoaderState::Ready);
                Ok(TickOutcome::Idle)
            }
            FetchError::Timeout(elapsed) => {
                // Depress the estimate so the next selection falls back to a
                // lower rendition, then retry from Ready.
                self.estimator.push_timeout(elapsed);
                if let Some(bps) = self.estimator.estimate_bps() {
                    let _ = self.events.send(LoaderEvent::BandwidthUpdate { bps });
                }
                self.finish_request(LoaderState::Ready);
                Ok(TickOutcome::Idle)
            }
            err @ FetchError::Failure { .. } => {
                self.finish_request(LoaderState::Ready);
                Err(LoaderError::Fetch {
                    playlist,
                    source: err,
                })
            }
        }
    }

    fn record_bandwidth(&self, fetched: &crate::traits::FetchedPayload) {
        let source = if fetched.from_cache {
            SampleSource::Cache
        } else {
            SampleSource::Network
        };
        self.estimator.push_sample(ThroughputSample {
            bytes: fetched.bytes.len() as u64,
            duration: fetched.round_trip,
            at: Instant::now(),
            source,
        });
        if source == SampleSource::Network
            && let Some(bps) = self.estimator.estimate_bps()
        {
            let _ = self.events.send(LoaderEvent::BandwidthUpdate { bps });
        }
    }

    fn finish_request(&mut self, state: LoaderState) {
        self.pending = None;
        if !self.state.is_disposed() {
            self.state = state;
        }
    }

    fn at_vod_end(&self) -> bool {
        let Some(playlist) = self.playlist.as_deref() else {
            return false;
        };
        playlist.end_list
            && !playlist.is_empty()
            && self.media_index == Some(playlist.len() - 1)
    }
}
