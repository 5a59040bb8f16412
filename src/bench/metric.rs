//! Measured-or-fallback metric values
//!
//! Every benchmark metric records whether it was actually measured or
//! substituted from a documented conservative default, so fallback use is
//! observable in reports and testable instead of silently absorbed.

use serde::{Deserialize, Serialize};

/// Why a metric fell back to its conservative default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackReason {
    /// Benchmark tool is not installed
    ToolMissing,
    /// Tool ran but exited with a failure status
    ToolFailed,
    /// Tool output could not be parsed
    ParseFailed,
}

impl FallbackReason {
    /// Short human label for reports
    pub fn label(&self) -> &'static str {
        match self {
            FallbackReason::ToolMissing => "tool missing",
            FallbackReason::ToolFailed => "tool failed",
            FallbackReason::ParseFailed => "unparsable output",
        }
    }
}

/// Where a metric value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricSource {
    /// Value produced by the external benchmark tool
    Measured,
    /// Value produced by the in-process native probe
    NativeProbe,
    /// Documented conservative default
    Fallback(FallbackReason),
}

/// A single benchmark metric with provenance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Metric value in the unit the field name declares
    pub value: f64,
    /// Provenance of the value
    pub source: MetricSource,
}

impl Metric {
    /// A value measured by the external benchmark tool
    pub fn measured(value: f64) -> Self {
        Self {
            value,
            source: MetricSource::Measured,
        }
    }

    /// A value produced by the in-process native probe
    pub fn native(value: f64) -> Self {
        Self {
            value,
            source: MetricSource::NativeProbe,
        }
    }

    /// A documented conservative default
    pub fn fallback(value: f64, reason: FallbackReason) -> Self {
        Self {
            value,
            source: MetricSource::Fallback(reason),
        }
    }

    /// True when the value is a substituted default rather than a measurement
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, MetricSource::Fallback(_))
    }

    /// Render the value with a marker when it is a fallback
    pub fn display(&self, unit: &str) -> String {
        match self.source {
            MetricSource::Fallback(reason) => {
                format!("{:.1} {} (default, {})", self.value, unit, reason.label())
            }
            MetricSource::NativeProbe => format!("{:.1} {} (native probe)", self.value, unit),
            MetricSource::Measured => format!("{:.1} {}", self.value, unit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_observable() {
        let m = Metric::fallback(500.0, FallbackReason::ToolMissing);
        assert!(m.is_fallback());
        assert!(m.display("events/s").contains("default"));

        let m = Metric::measured(1234.5);
        assert!(!m.is_fallback());
        assert!(!m.display("events/s").contains("default"));
    }
}
