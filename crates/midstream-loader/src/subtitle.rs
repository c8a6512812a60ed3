use std::sync::Arc;

use bytes::Bytes;
use midstream_core::{PlayheadView, SegmentTiming, TimeRange, TimeRanges, TrackType};
use midstream_playlist::Playlist;
use midstream_sync::SyncController;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::{
    error::{LoaderError, LoaderResult},
    events::LoaderEvent,
    loader::TickOutcome,
    options::LoaderOptions,
    request::NextRequest,
    state::LoaderState,
    traits::{FetchError, FetchRequest, SegmentFetcher},
};

/// A fetched subtitle segment with its presentation placement.
#[derive(Clone, Debug)]
pub struct SubtitleCues {
    pub bytes: Bytes,
    pub start: f64,
    pub end: f64,
    pub media_sequence: u64,
}

/// Cue consumer. Parsing and rendering live outside the engine.
pub trait SubtitleSink: Send + Sync {
    fn deliver(&self, cues: SubtitleCues);
}

/// Subtitle-specialized segment loader.
///
/// Shares the main loader's skeleton but differs where subtitles differ:
/// placement comes from declared durations anchored at a sync point (no
/// demuxer timing wait), payloads go to a [`SubtitleSink`] rather than the
/// buffer sink, and the loader never participates in timestamp-offset
/// authority; it simply follows timing the other tracks establish.
pub struct SubtitleLoader<F, S> {
    fetcher: Arc<F>,
    sink: Arc<S>,
    sync: Arc<SyncController>,
    playhead: Arc<dyn PlayheadView>,
    events: mpsc::UnboundedSender<LoaderEvent>,
    options: LoaderOptions,

    state: LoaderState,
    playlist: Option<Arc<Playlist>>,
    media_index: Option<usize>,
    /// Presentation ranges already delivered; the subtitle analogue of a
    /// buffered() query.
    delivered: TimeRanges,
    paused: bool,
    ended_notified: bool,
}

impl<F, S> SubtitleLoader<F, S>
where
    F: SegmentFetcher,
    S: SubtitleSink,
{
    pub fn new(
        fetcher: Arc<F>,
        sink: Arc<S>,
        sync: Arc<SyncController>,
        playhead: Arc<dyn PlayheadView>,
        events: mpsc::UnboundedSender<LoaderEvent>,
        options: LoaderOptions,
    ) -> Self {
        Self {
            fetcher,
            sink,
            sync,
            playhead,
            events,
            options,
            state: LoaderState::Init,
            playlist: None,
            media_index: None,
            delivered: TimeRanges::new(),
            paused: false,
            ended_notified: false,
        }
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn track(&self) -> TrackType {
        TrackType::Subtitle
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

    pub fn update_playlist(&mut self, playlist: Arc<Playlist>) {
        if self.state.is_disposed() {
            return;
        }
        let current_time = self.playhead.current_time();

        if let Some(old) = self.playlist.take() {
            if old.id == playlist.id {
                if let Some(index) = self.media_index {
                    let sequence = old.segment(index).map(|s| s.media_sequence);
                    self.media_index = sequence.and_then(|msn| playlist.index_of_sequence(msn));
                }
                self.sync
                    .save_expired_segment_info(self.track(), &old, &playlist);
            } else {
                // Subtitle track/language switch: delivered cues are stale.
                debug!(from = %old.id, to = %playlist.id, "subtitle_loader::retarget");
                self.media_index = None;
                self.delivered = TimeRanges::new();
            }
        }

        self.sync
            .update_media_sequence_sync(self.track(), &playlist, current_time);
        self.playlist = Some(playlist);
        self.ended_notified = false;
        if self.state == LoaderState::Init && !self.paused {
            self.state = LoaderState::Ready;
        }
    }

    pub fn abort(&mut self) {
        if !self.state.is_disposed() && self.state == LoaderState::Waiting {
            self.state = LoaderState::Ready;
        }
    }

    pub fn reset(&mut self) {
        self.abort();
        self.media_index = None;
        self.delivered = TimeRanges::new();
        self.sync.reset_track(self.track());
    }

    pub fn dispose(&mut self) {
        self.playlist = None;
        self.state = LoaderState::Disposed;
    }

    fn choose_next_request(&self) -> Option<NextRequest> {
        if self.paused || !self.state.can_pick() {
            return None;
        }
        let playlist = self.playlist.as_deref()?;
        if playlist.is_empty() {
            return None;
        }

        let current_time = self.playhead.current_time();
        let forward = self
            .delivered
            .end()
            .map_or(0.0, |end| (end - current_time).max(0.0));
        if forward >= self.options.goal_buffer.at(current_time) {
            return None;
        }

        let target_time = self.delivered.end().unwrap_or(current_time);

        if let Some(prev) = self.media_index {
            let next = prev + 1;
            let segment = playlist.segment(next)?;
            let start = segment
                .timing()
                .map(|t| t.start)
                .or_else(|| playlist.segment(prev).and_then(|p| p.timing()).map(|t| t.end))
                .unwrap_or(target_time);
            return Some(NextRequest {
                segment_index: next,
                part_index: None,
                media_sequence: segment.media_sequence,
                start_of_segment: start,
                target_time,
                is_sync_request: false,
            });
        }

        // Subtitles never probe: without a sync anchor they wait for the
        // other tracks to establish timing.
        let sp = self.sync.get_sync_point(
            self.track(),
            playlist,
            playlist.duration(),
            Default::default(),
            target_time,
        )?;
        let pos = playlist.position_for_time(
            sp.segment_index,
            sp.time,
            target_time,
            self.options.boundary_fudge,
        )?;
        let segment = playlist.segment(pos.segment_index)?;
        Some(NextRequest {
            segment_index: pos.segment_index,
            part_index: None,
            media_sequence: segment.media_sequence,
            start_of_segment: pos.start_time,
            target_time,
            is_sync_request: false,
        })
    }

    /// One monitor pass.
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

        let Some(playlist) = self.playlist.clone() else {
            return Ok(TickOutcome::Idle);
        };
        let Some(segment) = playlist.segment(request.segment_index) else {
            return Ok(TickOutcome::Idle);
        };
        let playlist_id = playlist.id;

        self.state = LoaderState::Waiting;
        let timeout = self.options.request_timeout(segment.duration, true);
        let fetched = match self
            .fetcher
            .fetch(FetchRequest {
                uri: segment.uri.clone(),
                byte_range: segment.byte_range.clone(),
                timeout,
            })
            .await
        {
            Ok(payload) => payload,
            Err(FetchError::Aborted) | Err(FetchError::Timeout(_)) => {
                // Subtitle fetches never degrade the bandwidth estimate.
                self.state = LoaderState::Ready;
                return Ok(TickOutcome::Idle);
            }
            Err(err @ FetchError::Failure { .. }) => {
                self.state = LoaderState::Ready;
                return Err(LoaderError::Fetch {
                    playlist: playlist_id,
                    source: err,
                });
            }
        };

        // Placement from declared duration, anchored by the walk.
        let placed = SegmentTiming::new(
            request.start_of_segment,
            request.start_of_segment + segment.duration,
        );
        segment.set_timing(placed);

        self.sink.deliver(SubtitleCues {
            bytes: fetched.bytes,
            start: placed.start,
            end: placed.end,
            media_sequence: segment.media_sequence,
        });

        self.delivered.add(TimeRange::new(placed.start, placed.end));
        self.media_index = Some(request.segment_index);
        self.sync.mark_appended(self.track(), segment.media_sequence);
        self.state = LoaderState::Ready;

        trace!(
            media_sequence = segment.media_sequence,
            start = placed.start,
            end = placed.end,
            "subtitle_loader::delivered"
        );
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

    fn at_vod_end(&self) -> bool {
        let Some(playlist) = self.playlist.as_deref() else {
            return false;
        };
        playlist.end_list
            && !playlist.is_empty()
            && self.media_index == Some(playlist.len() - 1)
    }
}
