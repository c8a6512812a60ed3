#![forbid(unsafe_code)]

//! Adaptive-bitrate machinery: a dual-EWMA throughput estimator and the
//! water-line switching policy.
//!
//! This crate is protocol-agnostic: candidates are `(id, bandwidth)` pairs
//! and every decision input is passed in explicitly, so the policy functions
//! stay pure and the clock stays in the caller's hands.

pub mod estimator;
pub mod policy;
pub mod types;

pub use estimator::{Estimator, SharedEstimator, ThroughputEstimator};
pub use policy::{
    SwitchCheck, SwitchInputs, SwitchReason, select_candidate, select_with, should_switch,
};
pub use types::{AbrOptions, Candidate, SampleSource, ThroughputSample, WaterLine};
