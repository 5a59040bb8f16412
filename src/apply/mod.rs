//! Staged application of approved changes

pub mod applier;
pub mod plan;

pub use applier::{ApplyReport, StagedApplier};
pub use plan::ApplyPlan;
