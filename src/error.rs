//! Error taxonomy for the alignment core.
//!
//! Mirrors the five stable ABI error kinds 1:1 so the FFI bridge never has
//! to guess a mapping at the boundary.

use thiserror::Error;

/// Stable, ABI-facing error kind. Numeric values must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorKind {
    Success = 0,
    InvalidInput = 1,
    InsufficientData = 2,
    ProcessingFailed = 3,
    OutOfMemory = 4,
    UnsupportedFormat = 5,
}

impl ErrorKind {
    pub fn description(self) -> &'static str {
        match self {
            ErrorKind::Success => "success",
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::InsufficientData => "insufficient data",
            ErrorKind::ProcessingFailed => "processing failed",
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::UnsupportedFormat => "unsupported format",
        }
    }
}

/// Severity for a logged diagnostic record, independent of `ErrorKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

/// Internal error type. Every fallible operation in the core returns this;
/// the FFI bridge is the only place it gets collapsed to an `ErrorKind`.
#[derive(Error, Debug, Clone)]
pub enum AlignError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("processing failed: {0}")]
    ProcessingFailed(String),

    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl AlignError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AlignError::InvalidInput(_) => ErrorKind::InvalidInput,
            AlignError::InsufficientData(_) => ErrorKind::InsufficientData,
            AlignError::ProcessingFailed(_) => ErrorKind::ProcessingFailed,
            AlignError::OutOfMemory(_) => ErrorKind::OutOfMemory,
            AlignError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            // Cancellation has no dedicated ABI kind; surfaced as processing failure.
            AlignError::Cancelled(_) => ErrorKind::ProcessingFailed,
        }
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            AlignError::InvalidInput(_) => "check buffer pointers, sample finiteness and sample count bounds",
            AlignError::InsufficientData(_) => "supply a longer buffer or degrade to a less data-hungry method",
            AlignError::ProcessingFailed(_) => "retry with hybrid method or lower confidence_threshold",
            AlignError::OutOfMemory(_) => "reduce window_size or process in smaller batches",
            AlignError::UnsupportedFormat(_) => "resample to a common, supported sample rate",
            AlignError::Cancelled(_) => "operation was cancelled by the caller",
        }
    }
}

pub type Result<T> = std::result::Result<T, AlignError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_mapping_is_stable() {
        assert_eq!(ErrorKind::Success as i32, 0);
        assert_eq!(ErrorKind::InvalidInput as i32, 1);
        assert_eq!(ErrorKind::InsufficientData as i32, 2);
        assert_eq!(ErrorKind::ProcessingFailed as i32, 3);
        assert_eq!(ErrorKind::OutOfMemory as i32, 4);
        assert_eq!(ErrorKind::UnsupportedFormat as i32, 5);
    }

    #[test]
    fn cancelled_surfaces_as_processing_failed() {
        let e = AlignError::Cancelled("stop".into());
        assert_eq!(e.kind(), ErrorKind::ProcessingFailed);
    }
}
