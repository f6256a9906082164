//! # sc-session
//!
//! The round-based optimization session engine: samples an action with
//! Kernel Thompson Sampling, hands it to the injected measurement capability,
//! combines the per-objective scores into a scalar reward, and updates the
//! model and the on-disk records, one round at a time.

pub mod combine;
pub mod measure;
pub mod session;

pub use combine::RewardCombiner;
pub use measure::Acquisition;
pub use session::{OptimizationSession, SessionReport, SessionState, StopHandle};
