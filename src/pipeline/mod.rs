//! The classification pipeline: shared types and the decision engine.

pub mod engine;
pub mod types;

pub use engine::{BatchSummary, CONFIDENCE_THRESHOLD, DecisionEngine};
pub use types::{Label, RawEmail, Stage, StageResult, Verdict};
