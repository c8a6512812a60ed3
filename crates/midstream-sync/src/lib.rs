#![forbid(unsafe_code)]

//! Timeline synchronization: reconciling playlist-relative segment indices
//! with presentation time across live refreshes and discontinuities.
//!
//! Sync points are produced by an ordered list of pure strategies; the
//! candidate whose predicted time lands closest to the requested time wins,
//! with ties broken by strategy priority.

pub mod controller;
pub mod media_sequence;
pub mod strategies;
pub mod timeline;

pub use controller::{CarriedSync, MappingSource, SyncController};
pub use media_sequence::{MediaSequenceSync, SyncRange};
pub use strategies::SyncPoint;
pub use timeline::{TimelineChange, TimelineChangeController};
