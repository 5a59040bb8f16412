//! Error types for VmTune
//!
//! This module defines all error types used throughout the application,
//! providing detailed error information for debugging and operator feedback.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for VmTune operations
#[derive(Error, Debug)]
pub enum VmTuneError {
    /// I/O error during file operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read or write a kernel tunable
    #[error("sysctl '{key}' failed: {message}")]
    Sysctl { key: String, message: String },

    /// A kernel tunable held a value we could not parse
    #[error("sysctl '{key}' returned unparsable value '{value}'")]
    SysctlParse { key: String, value: String },

    /// External benchmark tool produced output we could not parse
    #[error("Failed to parse {tool} output: {message}")]
    BenchParse { tool: String, message: String },

    /// Safety gate rejected the run before any mutation
    #[error("Safety check failed: {0}")]
    SafetyRejected(String),

    /// Swap file setup failed
    #[error("Swap setup failed at '{path}': {message}")]
    SwapSetup { path: PathBuf, message: String },

    /// External command exited with a failure status
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Insufficient disk space for a planned change
    #[error("Insufficient disk space at '{path}': need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        path: PathBuf,
        required: u64,
        available: u64,
    },

    /// Apply phase failed mid-run
    #[error("Apply failed during {phase} phase: {message}")]
    ApplyFailed { phase: String, message: String },

    /// Operation requires root privileges
    #[error("Operation requires root privileges: {0}")]
    NotRoot(String),

    /// Unsupported operation on this platform
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl VmTuneError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a sysctl error
    pub fn sysctl(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sysctl {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a benchmark output parse error
    pub fn bench_parse(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BenchParse {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a swap setup error
    pub fn swap(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::SwapSetup {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. }
            | Self::SwapSetup { path, .. }
            | Self::InsufficientSpace { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Result type alias for VmTune operations
pub type Result<T> = std::result::Result<T, VmTuneError>;

impl From<std::io::Error> for VmTuneError {
    fn from(err: std::io::Error) -> Self {
        VmTuneError::Io {
            path: std::path::PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for VmTuneError {
    fn from(err: serde_json::Error) -> Self {
        VmTuneError::bench_parse("json", err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| VmTuneError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = VmTuneError::io("/proc/sys/vm/swappiness", io_err);
        assert!(err.path().is_some());
        assert_eq!(
            err.path().unwrap(),
            &PathBuf::from("/proc/sys/vm/swappiness")
        );
    }

    #[test]
    fn test_display_messages() {
        let rejected = VmTuneError::SafetyRejected("available memory below 50 MB".into());
        assert!(rejected.to_string().contains("Safety check failed"));

        let apply = VmTuneError::ApplyFailed {
            phase: "swap".into(),
            message: "mkswap failed".into(),
        };
        assert!(apply.to_string().contains("swap"));
        assert!(apply.to_string().contains("mkswap failed"));
    }
}
