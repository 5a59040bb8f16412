//! Tunable recommendation
//!
//! Derives target values for every managed tunable from the hardware
//! profile, raw benchmark metrics, and normalized scores. Pure computation:
//! no system access beyond the inputs handed in.

pub mod calculator;
pub mod factors;

pub use calculator::{recommend, RecommendationSet};
