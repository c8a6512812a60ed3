use midstream_playlist::PlaylistId;
use thiserror::Error;

use crate::traits::FetchError;

/// Loader failures that escalate to the orchestrator.
///
/// Transient classes (timeout, abort, wrong-segment sync probes) are
/// recovered locally and never appear here.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Persistent network/content fault: exclusion candidate.
    #[error("segment fetch failed on {playlist}: {source}")]
    Fetch {
        playlist: PlaylistId,
        source: FetchError,
    },

    /// Unsupported or corrupt payload: exclusion candidate.
    #[error("demux failed on {playlist}: {message}")]
    Demux {
        playlist: PlaylistId,
        message: String,
    },

    /// A single segment cannot fit even after evicting all evictable back
    /// buffer: fatal for this rendition's content.
    #[error("append overflowed buffer capacity on {playlist} even after eviction")]
    AppendOverflow { playlist: PlaylistId },

    /// The buffer sink failed irrecoverably.
    #[error("buffer sink failure: {0}")]
    SinkFatal(String),

    #[error("loader is disposed")]
    Disposed,
}

pub type LoaderResult<T> = Result<T, LoaderError>;
