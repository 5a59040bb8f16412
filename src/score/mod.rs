//! Score normalization against fixed baselines

pub mod baseline;
pub mod normalizer;

pub use normalizer::{normalize, PerformanceScore};
