//! CLI arguments and run configuration

pub mod settings;

pub use settings::{CliArgs, Commands, OutputFormat, TuneConfig};
