use tracing::{debug, warn};
use web_time::Instant;

use crate::playlist::PlaylistId;

/// How long a rendition stays unselectable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExcludeUntil {
    /// Reconsidered once `Instant` has passed.
    Until(Instant),
    /// Capability faults and retry exhaustion: never reconsidered.
    Forever,
}

/// Mutable exclusion bookkeeping attached to a rendition.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExclusionState {
    /// Manually disabled by the host (representations API); never auto-cleared.
    pub disabled: bool,
    pub exclude_until: Option<ExcludeUntil>,
    /// Consecutive exclusions; drives the window growth and the permanent cap.
    pub retry_count: u32,
}

impl ExclusionState {
    pub fn is_excluded(&self, now: Instant) -> bool {
        match self.exclude_until {
            None => false,
            Some(ExcludeUntil::Forever) => true,
            Some(ExcludeUntil::Until(until)) => now < until,
        }
    }
}

/// One encoded variant of the presentation.
#[derive(Clone, Debug)]
pub struct Rendition {
    pub id: PlaylistId,
    pub uri: url::Url,
    pub bandwidth: u64,
    pub codecs: Option<String>,
    pub audio_group: Option<String>,
    /// Content-steering pathway this rendition is served through.
    pub pathway: Option<String>,
    pub exclusion: ExclusionState,
}

impl Rendition {
    pub fn new(id: PlaylistId, uri: url::Url, bandwidth: u64) -> Self {
        Self {
            id,
            uri,
            bandwidth,
            codecs: None,
            audio_group: None,
            pathway: None,
            exclusion: ExclusionState::default(),
        }
    }

    pub fn with_codecs<S: Into<String>>(mut self, codecs: S) -> Self {
        self.codecs = Some(codecs.into());
        self
    }

    pub fn with_audio_group<S: Into<String>>(mut self, group: S) -> Self {
        self.audio_group = Some(group.into());
        self
    }

    pub fn with_pathway<S: Into<String>>(mut self, pathway: S) -> Self {
        self.pathway = Some(pathway.into());
        self
    }

    pub fn is_selectable(&self, now: Instant) -> bool {
        !self.exclusion.disabled && !self.exclusion.is_excluded(now)
    }
}

/// The rendition list of one presentation, with exclusion-aware filtering.
#[derive(Clone, Debug, Default)]
pub struct RenditionSet {
    renditions: Vec<Rendition>,
}

impl RenditionSet {
    pub fn new(renditions: Vec<Rendition>) -> Self {
        Self { renditions }
    }

    pub fn len(&self) -> usize {
        self.renditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renditions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rendition> {
        self.renditions.iter()
    }

    pub fn get(&self, id: PlaylistId) -> Option<&Rendition> {
        self.renditions.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: PlaylistId) -> Option<&mut Rendition> {
        self.renditions.iter_mut().find(|r| r.id == id)
    }

    /// Renditions currently eligible for ABR selection, optionally limited to
    /// one steering pathway.
    pub fn selectable(&self, now: Instant, pathway: Option<&str>) -> Vec<&Rendition> {
        self.renditions
            .iter()
            .filter(|r| r.is_selectable(now))
            .filter(|r| match (pathway, r.pathway.as_deref()) {
                (Some(want), Some(have)) => want == have,
                (Some(_), None) | (None, _) => true,
            })
            .collect()
    }

    /// Exclude a rendition until `until`, bumping its retry counter.
    pub fn exclude(&mut self, id: PlaylistId, until: ExcludeUntil) {
        if let Some(r) = self.renditions.iter_mut().find(|r| r.id == id) {
            r.exclusion.exclude_until = Some(until);
            r.exclusion.retry_count += 1;
            debug!(
                rendition = %id,
                retries = r.exclusion.retry_count,
                forever = matches!(until, ExcludeUntil::Forever),
                "rendition_set::exclude"
            );
        }
    }

    /// Salvage pass: drop every timed exclusion except `keep`'s.
    ///
    /// Permanent exclusions (codec/capability faults) stay in place. Returns
    /// the number of renditions made selectable again.
    pub fn clear_other_exclusions(&mut self, keep: PlaylistId) -> usize {
        let mut cleared = 0;
        for r in &mut self.renditions {
            if r.id == keep {
                continue;
            }
            if matches!(r.exclusion.exclude_until, Some(ExcludeUntil::Until(_))) {
                r.exclusion.exclude_until = None;
                cleared += 1;
            }
        }
        if cleared > 0 {
            warn!(cleared, "rendition_set::clear_other_exclusions");
        }
        cleared
    }

    /// Whether no rendition at all would be selectable.
    pub fn all_excluded(&self, now: Instant) -> bool {
        self.renditions.iter().all(|r| !r.is_selectable(now))
    }
}
