use std::collections::HashMap;

use tracing::debug;
use web_time::Instant;

/// One CDN routing option for the same rendition set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pathway {
    pub id: String,
    /// Lower is preferred.
    pub priority: u32,
}

/// Content-steering bookkeeping: which pathway to serve renditions from.
///
/// Consulted by rendition selection; pathway exclusions are time-bounded the
/// same way rendition exclusions are.
#[derive(Debug, Default)]
pub struct ContentSteering {
    pathways: Vec<Pathway>,
    excluded_until: HashMap<String, Instant>,
}

impl ContentSteering {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the pathway list (e.g. from a steering manifest
    /// refresh). Keeps existing exclusions for pathways that survive.
    pub fn update_pathways(&mut self, mut pathways: Vec<Pathway>) {
        pathways.sort_by_key(|p| p.priority);
        self.excluded_until
            .retain(|id, _| pathways.iter().any(|p| &p.id == id));
        self.pathways = pathways;
    }

    pub fn is_empty(&self) -> bool {
        self.pathways.is_empty()
    }

    /// Preferred usable pathway, if any are configured.
    pub fn current_pathway(&self, now: Instant) -> Option<&str> {
        self.pathways
            .iter()
            .find(|p| !self.is_excluded(&p.id, now))
            .map(|p| p.id.as_str())
    }

    pub fn exclude_pathway(&mut self, id: &str, now: Instant, duration: std::time::Duration) {
        debug!(pathway = id, ?duration, "content_steering::exclude");
        self.excluded_until.insert(id.to_string(), now + duration);

        // Salvage: with every pathway excluded, forget the exclusions and
        // fall back to priority order.
        if self.current_pathway(now).is_none() {
            debug!("content_steering::all_excluded_salvage");
            self.excluded_until.clear();
        }
    }

    fn is_excluded(&self, id: &str, now: Instant) -> bool {
        self.excluded_until.get(id).is_some_and(|until| now < *until)
    }
}
