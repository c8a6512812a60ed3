#![forbid(unsafe_code)]

//! The playback watcher: an independent observer of playhead progress that
//! detects stalls, bad seeks, and small buffer gaps, and issues corrective
//! seeks when the loaders alone would leave playback stuck.

pub mod watcher;

pub use watcher::{PlaybackWatcher, WatchInputs, WatcherAction, WatcherOptions};
