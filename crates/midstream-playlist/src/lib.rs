#![forbid(unsafe_code)]

//! Playlist data model: immutable segment arenas, copy-on-refresh merge, and
//! rendition/exclusion bookkeeping.
//!
//! The external manifest parser produces [`PlaylistHeader`] +
//! [`SegmentTemplate`] values; everything downstream of that boundary is owned
//! here. Segments are immutable records shared by `Arc`; the only
//! post-construction write is the write-once presentation timing fact.

pub mod playlist;
pub mod rendition;
pub mod segment;

pub use playlist::{MediaPosition, Playlist, PlaylistHeader, PlaylistId, RefreshStats};
pub use rendition::{ExcludeUntil, ExclusionState, Rendition, RenditionSet};
pub use segment::{InitRef, KeyRef, Part, Segment, SegmentTemplate};
