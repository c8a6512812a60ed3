#![forbid(unsafe_code)]

//! Shared primitives for the midstream workspace: track identities, timeline
//! epochs, presentation-time ranges, and the playhead abstraction.

pub mod playhead;
pub mod ranges;
pub mod timing;
pub mod track;

pub use playhead::PlayheadView;
pub use ranges::{TimeRange, TimeRanges};
pub use timing::{SegmentTiming, Timeline, TimingInfo};
pub use track::TrackType;
