//! Pipeline engine and run reporting types

pub mod engine;

pub use engine::{Analysis, RunOutcome, TuneEngine, TuneReport};
