use std::{collections::HashSet, sync::Arc};

use midstream_abr::{
    Candidate, SharedEstimator, SwitchInputs, SwitchReason, select_candidate, should_switch,
};
use midstream_core::{PlayheadView, TrackType};
use midstream_loader::{
    AudioProfile, BufferSink, Demuxer, LoaderError, LoaderEvent, PrimaryProfile, SegmentFetcher,
    SegmentLoader, SubtitleLoader, SubtitleSink, TickOutcome, TrackInfo,
};
use midstream_playlist::{
    ExcludeUntil, Playlist, PlaylistHeader, PlaylistId, Rendition, RenditionSet, SegmentTemplate,
};
use midstream_sync::{SyncController, TimelineChangeController};
use midstream_watch::{PlaybackWatcher, WatchInputs, WatcherAction};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use web_time::Instant;

use crate::{
    events::{EngineEvent, EventEmitter},
    options::EngineOptions,
    steering::ContentSteering,
};

/// Manifest collaborator: turns rendition URIs into parsed playlists and
/// refreshes them. Parsing itself lives outside the engine.
#[expect(async_fn_in_trait)]
pub trait PlaylistSource: Send + Sync {
    async fn load(
        &self,
        rendition: &Rendition,
    ) -> Result<(PlaylistHeader, Vec<SegmentTemplate>), String>;

    async fn refresh(
        &self,
        playlist: &Playlist,
    ) -> Result<(PlaylistHeader, Vec<SegmentTemplate>), String>;
}

/// Everything the engine talks to but does not own.
pub struct Collaborators<F, D, B, S, PS> {
    pub fetcher: Arc<F>,
    pub demuxer: Arc<D>,
    pub sink: Arc<B>,
    pub subtitle_sink: Option<Arc<S>>,
    pub playhead: Arc<dyn PlayheadView>,
    pub source: Arc<PS>,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no viable rendition")]
    NoViableRendition,
}

/// What an exclusion attempt resolved to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExclusionOutcome {
    Excluded,
    /// Everything was excluded; other exclusions were cleared as a salvage.
    Salvaged,
    /// Nothing clearable remained: a terminal error was raised.
    Fatal,
    /// The playlist is not in the rendition set.
    Unknown,
}

/// Top-level orchestrator: owns one loader per track, runs ABR, manages
/// exclusion/recovery and steering, and coordinates multi-loader concerns.
pub struct PlaylistController<F, D, B, S, PS> {
    options: EngineOptions,
    renditions: RenditionSet,
    current: Option<PlaylistId>,

    primary: SegmentLoader<PrimaryProfile, F, D, B>,
    audio: Option<SegmentLoader<AudioProfile, F, D, B>>,
    subtitle: Option<SubtitleLoader<F, S>>,

    fetcher: Arc<F>,
    demuxer: Arc<D>,
    sink: Arc<B>,
    subtitle_sink: Option<Arc<S>>,
    playhead: Arc<dyn PlayheadView>,
    source: Arc<PS>,

    sync: Arc<SyncController>,
    timeline_changes: Arc<TimelineChangeController>,
    estimator: Arc<SharedEstimator>,
    steering: ContentSteering,
    watcher: PlaybackWatcher,
    emitter: EventEmitter,

    loader_events_tx: mpsc::UnboundedSender<LoaderEvent>,
    loader_events: Option<mpsc::UnboundedReceiver<LoaderEvent>>,

    /// Host override for rendition selection.
    selector: Option<Selector>,
    established_track_info: Option<TrackInfo>,
    ended_tracks: HashSet<TrackType>,
    ended_emitted: bool,
    last_pass_progress: bool,
    abr_check_requested: bool,
    last_refresh: Option<Instant>,
}

type Selector = Box<dyn Fn(&[Candidate], Option<u64>) -> Option<u64> + Send + Sync>;

impl<F, D, B, S, PS> PlaylistController<F, D, B, S, PS>
where
    F: SegmentFetcher,
    D: Demuxer,
    B: BufferSink,
    S: SubtitleSink,
    PS: PlaylistSource,
{
    pub fn new(
        options: EngineOptions,
        renditions: Vec<Rendition>,
        collaborators: Collaborators<F, D, B, S, PS>,
    ) -> Self {
        let Collaborators {
            fetcher,
            demuxer,
            sink,
            subtitle_sink,
            playhead,
            source,
        } = collaborators;

        let sync = Arc::new(SyncController::new());
        let timeline_changes = Arc::new(TimelineChangeController::new());
        let estimator = Arc::new(SharedEstimator::new());
        let emitter = EventEmitter::new(options.events_capacity);
        let (loader_events_tx, loader_events_rx) = mpsc::unbounded_channel();

        let primary = SegmentLoader::new(
            PrimaryProfile,
            Arc::clone(&fetcher),
            Arc::clone(&demuxer),
            Arc::clone(&sink),
            Arc::clone(&sync),
            Arc::clone(&timeline_changes),
            Arc::clone(&estimator),
            Arc::clone(&playhead),
            loader_events_tx.clone(),
            options.loader.clone(),
        );
        let watcher = PlaybackWatcher::new(Arc::clone(&playhead), options.watcher.clone());

        Self {
            options,
            renditions: RenditionSet::new(renditions),
            current: None,
            primary,
            audio: None,
            subtitle: None,
            fetcher,
            demuxer,
            sink,
            subtitle_sink,
            playhead,
            source,
            sync,
            timeline_changes,
            estimator,
            steering: ContentSteering::new(),
            watcher,
            emitter,
            loader_events_tx,
            loader_events: Some(loader_events_rx),
            selector: None,
            established_track_info: None,
            ended_tracks: HashSet::new(),
            ended_emitted: false,
            last_pass_progress: false,
            abr_check_requested: false,
            last_refresh: None,
        }
    }

    pub fn events(&self) -> tokio::sync::broadcast::Receiver<EngineEvent> {
        self.emitter.subscribe()
    }

    pub fn current_rendition(&self) -> Option<PlaylistId> {
        self.current
    }

    pub fn estimator(&self) -> &Arc<SharedEstimator> {
        &self.estimator
    }

    pub fn steering_mut(&mut self) -> &mut ContentSteering {
        &mut self.steering
    }

    pub fn renditions(&self) -> &RenditionSet {
        &self.renditions
    }

    /// Install a host override for rendition selection.
    pub fn set_playlist_selector(&mut self, selector: Selector) {
        self.selector = Some(selector);
    }

    pub fn pause(&mut self) {
        self.primary.pause();
        if let Some(audio) = self.audio.as_mut() {
            audio.pause();
        }
        if let Some(subtitle) = self.subtitle.as_mut() {
            subtitle.pause();
        }
    }

    pub fn resume(&mut self) {
        self.primary.resume();
        if let Some(audio) = self.audio.as_mut() {
            audio.resume();
        }
        if let Some(subtitle) = self.subtitle.as_mut() {
            subtitle.resume();
        }
    }

    /// Pause or resume a single track's loader.
    pub fn set_track_paused(&mut self, track: TrackType, paused: bool) {
        match track {
            TrackType::Primary => {
                if paused {
                    self.primary.pause();
                } else {
                    self.primary.resume();
                }
            }
            TrackType::AlternateAudio => {
                if let Some(audio) = self.audio.as_mut() {
                    if paused {
                        audio.pause();
                    } else {
                        audio.resume();
                    }
                }
            }
            TrackType::Subtitle => {
                if let Some(subtitle) = self.subtitle.as_mut() {
                    if paused {
                        subtitle.pause();
                    } else {
                        subtitle.resume();
                    }
                }
            }
        }
    }

    /// Initial rendition selection and playlist load.
    pub async fn start(&mut self, now: Instant) -> Result<(), EngineError> {
        self.check_abr(now).await;
        if self.current.is_none() {
            return Err(EngineError::NoViableRendition);
        }
        Ok(())
    }

    fn candidates(&self, now: Instant) -> Vec<Candidate> {
        let pathway = self.steering.current_pathway(now).map(str::to_owned);
        self.renditions
            .selectable(now, pathway.as_deref())
            .into_iter()
            .map(|r| Candidate {
                id: r.id.0,
                bandwidth: r.bandwidth,
            })
            .collect()
    }

    fn pick(&self, candidates: &[Candidate]) -> Option<PlaylistId> {
        let estimate = self.estimator.estimate_bps();
        let picked = match &self.selector {
            Some(select) => select(candidates, estimate)
                .and_then(|id| candidates.iter().find(|c| c.id == id).copied()),
            None => select_candidate(candidates, estimate, self.options.abr.safety_factor),
        };
        picked.map(|c| PlaylistId(c.id))
    }

    /// The continuous "should I switch rendition?" check.
    pub async fn check_abr(&mut self, now: Instant) {
        let candidates = self.candidates(now);
        let Some(best) = self.pick(&candidates) else {
            return;
        };

        // An excluded current rendition must be abandoned regardless of
        // buffer state, so it participates as "no current".
        let current_candidate = self
            .current
            .and_then(|id| self.renditions.get(id))
            .filter(|r| r.is_selectable(now))
            .map(|r| Candidate {
                id: r.id.0,
                bandwidth: r.bandwidth,
            });
        let Some(best_candidate) = candidates.iter().find(|c| c.id == best.0).copied() else {
            return;
        };

        let current_time = self.playhead.current_time();
        let buffered = self.sink.buffered(TrackType::Primary);
        let forward = buffered
            .end()
            .map_or(0.0, |end| (end - current_time).max(0.0));
        let playlist = self.primary.playlist();
        let duration = playlist.map_or(f64::INFINITY, |p| p.duration());
        let is_low_latency = playlist.is_some_and(|p| p.part_target_duration.is_some());

        let check = should_switch(
            &self.options.abr,
            &SwitchInputs {
                current: current_candidate.as_ref(),
                candidate: &best_candidate,
                forward_buffer_secs: forward,
                playtime_secs: current_time,
                duration,
                is_low_latency,
                has_buffer: !buffered.is_empty(),
            },
        );

        if !check.allow {
            return;
        }

        debug!(to = %best, reason = ?check.reason, "playlist_controller::switch");
        self.apply_rendition(best, check.reason, now).await;
    }

    /// Load and install a rendition's playlist on the primary loader.
    ///
    /// Non-destructive: buffered data stays. Falls back (with exclusion) when
    /// the playlist cannot be loaded.
    async fn apply_rendition(
        &mut self,
        to: PlaylistId,
        reason: SwitchReason,
        now: Instant,
    ) -> bool {
        let mut target = Some(to);
        // Each failed load excludes its rendition, so this terminates.
        for _ in 0..=self.renditions.len() {
            let Some(id) = target else { return false };
            let Some(rendition) = self.renditions.get(id).cloned() else {
                return false;
            };

            match self.source.load(&rendition).await {
                Ok((mut header, templates)) => {
                    header.id = id;
                    let playlist = Arc::new(Playlist::new(header, templates));
                    let from = self.current;
                    self.primary.update_playlist(playlist);
                    self.current = Some(id);
                    let has_fallback = self.candidates(now).len() > 1;
                    self.primary.set_has_fallback(has_fallback);
                    info!(from = ?from, to = %id, reason = ?reason, "playlist_controller::rendition_applied");
                    self.emitter.emit_rendition_changed(from, id, reason);
                    return true;
                }
                Err(err) => {
                    warn!(rendition = %id, error = %err, "playlist_controller::load_failed");
                    self.emitter.emit_error(err, false);
                    self.exclude_playlist(id, now);
                    let candidates = self.candidates(now);
                    target = self.pick(&candidates);
                }
            }
        }
        false
    }

    /// Exclude a rendition after a fatal per-rendition error.
    ///
    /// The window grows with the retry counter and becomes permanent after
    /// the configured number of retries. If the exclusion leaves nothing
    /// selectable, every *other* timed exclusion is cleared first; only when
    /// that frees nothing is a terminal error raised.
    pub fn exclude_playlist(&mut self, id: PlaylistId, now: Instant) -> ExclusionOutcome {
        let Some(rendition) = self.renditions.get(id) else {
            warn!(playlist = %id, "playlist_controller::exclude_unknown");
            return ExclusionOutcome::Unknown;
        };

        let retries = rendition.exclusion.retry_count;
        let permanent = retries + 1 >= self.options.max_exclusion_retries;
        let until = if permanent {
            ExcludeUntil::Forever
        } else {
            let window = self
                .options
                .exclusion_base
                .saturating_mul(1u32 << retries.min(16));
            ExcludeUntil::Until(now + window)
        };

        self.renditions.exclude(id, until);
        self.emitter.emit_excluded(id, permanent, retries + 1);

        if self.renditions.all_excluded(now) {
            let cleared = self.renditions.clear_other_exclusions(id);
            if cleared == 0 {
                self.emitter
                    .emit_error("all renditions excluded; playback cannot continue", true);
                return ExclusionOutcome::Fatal;
            }
            return ExclusionOutcome::Salvaged;
        }
        ExclusionOutcome::Excluded
    }

    /// Permanent exclusion for codec/capability faults; retry cannot help.
    pub fn exclude_permanently(&mut self, id: PlaylistId) {
        self.renditions.exclude(id, ExcludeUntil::Forever);
        self.emitter.emit_excluded(id, true, 0);
    }

    /// Destructive quality change: clear buffered video past the playhead
    /// and re-seek in place to flush decoder-cached frames.
    pub async fn fast_quality_change(&mut self, now: Instant) {
        let current_time = self.playhead.current_time();
        info!(current_time, "playlist_controller::fast_quality_change");

        self.primary.abort();
        self.sink
            .remove(TrackType::Primary, current_time, f64::INFINITY);

        let candidates = self.candidates(now);
        if let Some(best) = self.pick(&candidates)
            && Some(best) != self.current
        {
            self.apply_rendition(best, SwitchReason::NoCurrent, now).await;
        }

        // Seek in place so the decoder drops frames from the old rendition.
        self.playhead.seek_to(current_time);
    }

    /// Switch the alternate-audio media group. Destructive for the audio
    /// loader: its buffer and learned sync facts cannot survive a track
    /// change.
    pub async fn set_audio_rendition(&mut self, rendition: Option<Rendition>) -> bool {
        if let Some(mut loader) = self.audio.take() {
            loader.reset();
            loader.dispose();
        }
        self.sink.remove(TrackType::AlternateAudio, 0.0, f64::INFINITY);
        self.sync.reset_track(TrackType::AlternateAudio);
        self.timeline_changes.clear_pending(TrackType::AlternateAudio);

        let Some(rendition) = rendition else {
            return true;
        };

        match self.source.load(&rendition).await {
            Ok((mut header, templates)) => {
                header.id = rendition.id;
                let playlist = Arc::new(Playlist::new(header, templates));
                let mut loader = SegmentLoader::new(
                    AudioProfile,
                    Arc::clone(&self.fetcher),
                    Arc::clone(&self.demuxer),
                    Arc::clone(&self.sink),
                    Arc::clone(&self.sync),
                    Arc::clone(&self.timeline_changes),
                    Arc::clone(&self.estimator),
                    Arc::clone(&self.playhead),
                    self.loader_events_tx.clone(),
                    self.options.loader.clone(),
                );
                loader.update_playlist(playlist);
                self.audio = Some(loader);
                self.ended_tracks.remove(&TrackType::AlternateAudio);
                self.ended_emitted = false;
                true
            }
            Err(err) => {
                self.emitter.emit_error(err, false);
                false
            }
        }
    }

    /// Switch the subtitle track. Requires a subtitle sink collaborator.
    pub async fn set_subtitle_rendition(&mut self, rendition: Option<Rendition>) -> bool {
        if let Some(mut loader) = self.subtitle.take() {
            loader.reset();
            loader.dispose();
        }
        self.sync.reset_track(TrackType::Subtitle);

        let Some(rendition) = rendition else {
            return true;
        };
        let Some(subtitle_sink) = self.subtitle_sink.as_ref() else {
            self.emitter
                .emit_error("no subtitle sink configured", false);
            return false;
        };

        match self.source.load(&rendition).await {
            Ok((mut header, templates)) => {
                header.id = rendition.id;
                let playlist = Arc::new(Playlist::new(header, templates));
                let mut loader = SubtitleLoader::new(
                    Arc::clone(&self.fetcher),
                    Arc::clone(subtitle_sink),
                    Arc::clone(&self.sync),
                    Arc::clone(&self.playhead),
                    self.loader_events_tx.clone(),
                    self.options.loader.clone(),
                );
                loader.update_playlist(playlist);
                self.subtitle = Some(loader);
                true
            }
            Err(err) => {
                self.emitter.emit_error(err, false);
                false
            }
        }
    }

    /// One monitor pass: advance every loader cooperatively.
    pub async fn monitor_pass(&mut self, now: Instant) {
        let audio = self.audio.as_mut();
        let subtitle = self.subtitle.as_mut();
        let (primary_out, audio_out, subtitle_out) = tokio::join!(
            self.primary.tick(),
            async move {
                match audio {
                    Some(loader) => Some(loader.tick().await),
                    None => None,
                }
            },
            async move {
                match subtitle {
                    Some(loader) => Some(loader.tick().await),
                    None => None,
                }
            },
        );

        let mut progress = false;
        for outcome in [Some(primary_out), audio_out, subtitle_out]
            .into_iter()
            .flatten()
        {
            match outcome {
                Ok(TickOutcome::Loaded { .. }) => progress = true,
                Ok(_) => {}
                Err(err) => self.handle_loader_error(err, now).await,
            }
        }
        self.last_pass_progress = progress;
    }

    async fn handle_loader_error(&mut self, err: LoaderError, now: Instant) {
        let message = err.to_string();
        match err {
            LoaderError::Fetch { playlist, .. }
            | LoaderError::Demux { playlist, .. }
            | LoaderError::AppendOverflow { playlist } => {
                self.emitter.emit_error(message, false);
                if self.exclude_playlist(playlist, now) != ExclusionOutcome::Fatal {
                    self.check_abr(now).await;
                }
            }
            LoaderError::SinkFatal(_) => {
                self.emitter.emit_error(message, true);
            }
            LoaderError::Disposed => {}
        }
    }

    /// Drain queued loader notifications outside of [`run`](Self::run)
    /// (hosts driving the engine pass-by-pass).
    pub fn pump_loader_events(&mut self) {
        let Some(rx) = self.loader_events.as_mut() else {
            return;
        };
        let mut drained = Vec::new();
        while let Ok(event) = rx.try_recv() {
            drained.push(event);
        }
        for event in drained {
            self.on_loader_event(event);
        }
    }

    /// Fold a loader notification into the engine event stream and react.
    pub fn on_loader_event(&mut self, event: LoaderEvent) {
        match event {
            LoaderEvent::TrackInfo {
                track,
                playlist,
                info,
            } => {
                self.emitter.emit(EngineEvent::TrackInfo {
                    track,
                    has_audio: info.has_audio,
                    has_video: info.has_video,
                });
                self.check_codec_compat(playlist, info);
            }
            LoaderEvent::TimingInfo { track, start, end } => {
                self.emitter
                    .emit(EngineEvent::TimingInfo { track, start, end });
            }
            LoaderEvent::Appended {
                track,
                playlist,
                media_sequence,
                start,
                end,
            } => {
                self.emitter.emit(EngineEvent::Appended {
                    track,
                    playlist,
                    media_sequence,
                    start,
                    end,
                });
            }
            LoaderEvent::SyncInfoUpdate { track } => {
                self.emitter.emit(EngineEvent::SyncInfoUpdate { track });
            }
            LoaderEvent::BandwidthUpdate { bps } => {
                self.emitter.emit(EngineEvent::BandwidthUpdate { bps });
                self.abr_check_requested = true;
            }
            LoaderEvent::Ended { track } => {
                self.ended_tracks.insert(track);
                let audio_done = self.audio.is_none()
                    || self.ended_tracks.contains(&TrackType::AlternateAudio);
                if self.ended_tracks.contains(&TrackType::Primary)
                    && audio_done
                    && !self.ended_emitted
                {
                    self.ended_emitted = true;
                    self.emitter.emit_ended();
                }
            }
        }
    }

    /// Codec-incompatibility exclusions run once, on the first track-info
    /// discovery: renditions whose declared codecs disagree with the
    /// discovered track layout can never play and are excluded permanently.
    fn check_codec_compat(&mut self, source_playlist: PlaylistId, info: TrackInfo) {
        if self.established_track_info.is_some() {
            return;
        }
        self.established_track_info = Some(info);

        let incompatible: Vec<PlaylistId> = self
            .renditions
            .iter()
            .filter(|r| r.id != source_playlist)
            .filter_map(|r| {
                let codecs = r.codecs.as_deref()?;
                let (declares_video, declares_audio) = codec_layout(codecs);
                ((declares_video != info.has_video) || (declares_audio != info.has_audio))
                    .then_some(r.id)
            })
            .collect();

        for id in incompatible {
            warn!(rendition = %id, "playlist_controller::codec_incompatible");
            self.exclude_permanently(id);
        }
    }

    /// One watcher pass.
    pub fn watch_pass(&mut self) {
        let has_video = self.established_track_info.is_none_or(|i| i.has_video);
        let live = self
            .primary
            .playlist()
            .is_some_and(|p| p.is_live());
        let inputs = WatchInputs {
            video_buffered: has_video.then(|| self.sink.buffered(TrackType::Primary)),
            audio_buffered: self
                .audio
                .as_ref()
                .map(|_| self.sink.buffered(TrackType::AlternateAudio)),
            seeking: false,
            loaders_busy: self.last_pass_progress,
            live,
        };

        let from = self.playhead.current_time();
        let action = self.watcher.tick(&inputs);
        self.report_watcher_action(from, action);
    }

    /// Host-signalled seek: run bad-seek correction immediately.
    pub fn handle_seek(&mut self) {
        let inputs = WatchInputs {
            seeking: true,
            ..WatchInputs::default()
        };
        let from = self.playhead.current_time();
        let action = self.watcher.fix_bad_seeks(&inputs);
        self.report_watcher_action(from, action);
    }

    fn report_watcher_action(&mut self, from: f64, action: WatcherAction) {
        let to = match action {
            WatcherAction::None => return,
            WatcherAction::SnappedToSeekableEnd(t)
            | WatcherAction::SnappedToSeekableStart(t)
            | WatcherAction::SkippedGap(t)
            | WatcherAction::ResyncedToLiveEdge(t)
            | WatcherAction::NudgedForVideoUnderflow(t) => t,
        };
        self.emitter.emit(EngineEvent::PlayheadCorrected { from, to });
    }

    /// Refresh live playlists on the target-duration cadence.
    pub async fn refresh_pass(&mut self, now: Instant) {
        let Some(playlist) = self.primary.playlist().map(Arc::clone) else {
            return;
        };
        if !playlist.is_live() {
            return;
        }
        let due = self.last_refresh.is_none_or(|last| {
            now.duration_since(last) >= self.options.refresh_interval(playlist.target_duration)
        });
        if !due {
            return;
        }
        self.last_refresh = Some(now);

        match self.source.refresh(&playlist).await {
            Ok((mut header, templates)) => {
                header.id = playlist.id;
                let (merged, stats) = playlist.merge_refresh(header, templates);
                debug!(
                    playlist = %merged.id,
                    expired = stats.expired,
                    added = stats.added,
                    "playlist_controller::refreshed"
                );
                self.primary.update_playlist(Arc::new(merged));
            }
            Err(err) => {
                warn!(error = %err, "playlist_controller::refresh_failed");
            }
        }

        // Audio follows the same cadence.
        let audio_playlist = self
            .audio
            .as_ref()
            .and_then(|a| a.playlist().map(Arc::clone));
        if let Some(playlist) = audio_playlist
            && playlist.is_live()
            && let Ok((mut header, templates)) = self.source.refresh(&playlist).await
        {
            header.id = playlist.id;
            let (merged, _) = playlist.merge_refresh(header, templates);
            if let Some(audio) = self.audio.as_mut() {
                audio.update_playlist(Arc::new(merged));
            }
        }
    }

    /// Drive everything until cancelled.
    pub async fn run(&mut self) {
        // A second concurrent `run` has nothing to drive.
        let Some(mut events_rx) = self.loader_events.take() else {
            return;
        };
        let mut monitor = tokio::time::interval(self.options.loader.monitor_interval);
        let mut abr = tokio::time::interval(self.options.abr_check_interval);
        let mut watch = tokio::time::interval(self.options.watcher.poll_interval);
        let mut refresh = tokio::time::interval(self.options.min_refresh_interval);
        let cancel = self.options.cancel.clone();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = monitor.tick() => {
                    self.monitor_pass(Instant::now()).await;
                }
                _ = abr.tick() => {
                    self.check_abr(Instant::now()).await;
                }
                _ = watch.tick() => {
                    self.watch_pass();
                }
                _ = refresh.tick() => {
                    self.refresh_pass(Instant::now()).await;
                }
                event = events_rx.recv() => {
                    if let Some(event) = event {
                        self.on_loader_event(event);
                    }
                }
            }

            if self.abr_check_requested {
                self.abr_check_requested = false;
                self.check_abr(Instant::now()).await;
            }
        }

        self.loader_events = Some(events_rx);
    }
}

fn codec_layout(codecs: &str) -> (bool, bool) {
    const VIDEO: &[&str] = &["avc1", "avc3", "hvc1", "hev1", "av01", "vp09", "vp8", "vp9"];
    const AUDIO: &[&str] = &["mp4a", "ac-3", "ec-3", "opus", "flac", "vorbis"];
    let video = VIDEO.iter().any(|c| codecs.contains(c));
    let audio = AUDIO.iter().any(|c| codecs.contains(c));
    (video, audio)
}
