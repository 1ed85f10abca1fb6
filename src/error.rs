//! Central error types for Stride Studio.
//!
//! This module provides typed errors for the processing pipeline, capture
//! sources and exporter. All errors implement `Serialize` so they can cross
//! an IPC boundary as plain strings.

use serde::Serialize;
use thiserror::Error;

/// Main error type for Stride Studio operations.
#[derive(Error, Debug)]
pub enum StrideError {
    /// File or camera source cannot be opened. Fatal to the session.
    #[error("Cannot open source: {0}")]
    SourceOpen(String),

    /// ffprobe failed or returned unusable metadata.
    #[error("Probe error: {0}")]
    Probe(String),

    /// Seek requested on a source that does not support it.
    #[error("Seek not supported: {0}")]
    SeekUnsupported(String),

    /// The model capability failed while annotating a frame.
    #[error("Annotation error: {0}")]
    Annotation(String),

    /// Model checkpoint could not be loaded.
    #[error("Model error: {0}")]
    Model(String),

    /// Empty buffer or unwritable destination during export.
    #[error("Export error: {0}")]
    Export(String),

    /// Underlying I/O failure (pipes, files, subprocesses).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Lock poisoned (mutex/rwlock)
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Serialize as the error message string.
impl Serialize for StrideError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<image::ImageError> for StrideError {
    fn from(err: image::ImageError) -> Self {
        StrideError::Other(err.to_string())
    }
}

impl From<String> for StrideError {
    fn from(msg: String) -> Self {
        StrideError::Other(msg)
    }
}

impl From<&str> for StrideError {
    fn from(msg: &str) -> Self {
        StrideError::Other(msg.to_string())
    }
}

/// Helper trait for converting mutex lock errors to StrideError.
pub trait LockResultExt<T> {
    /// Convert a poisoned lock error to StrideError with context.
    fn map_lock_err(self, context: &str) -> Result<T, StrideError>;
}

impl<T> LockResultExt<T> for Result<T, std::sync::PoisonError<T>> {
    fn map_lock_err(self, context: &str) -> Result<T, StrideError> {
        self.map_err(|_| StrideError::LockPoisoned {
            context: context.to_string(),
        })
    }
}

/// Extension trait for adding context to Results.
///
/// Similar to anyhow's `Context` trait, this allows chaining context
/// information onto errors for better debugging.
pub trait ResultExt<T> {
    /// Add context to an error, converting it to StrideError::Other.
    fn context(self, msg: &str) -> StrideResult<T>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F: FnOnce() -> String>(self, f: F) -> StrideResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn context(self, msg: &str) -> StrideResult<T> {
        self.map_err(|e| StrideError::Other(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> StrideResult<T> {
        self.map_err(|e| StrideError::Other(format!("{}: {}", f(), e)))
    }
}

/// Extension trait for adding context to Option types.
pub trait OptionExt<T> {
    /// Convert None to StrideError::Other with the given message.
    fn context(self, msg: &str) -> StrideResult<T>;

    /// Convert None to StrideError::Other with a lazily evaluated message.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> StrideResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn context(self, msg: &str) -> StrideResult<T> {
        self.ok_or_else(|| StrideError::Other(msg.to_string()))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> StrideResult<T> {
        self.ok_or_else(|| StrideError::Other(f()))
    }
}

/// Type alias for Results using StrideError.
pub type StrideResult<T> = Result<T, StrideError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StrideError::SourceOpen("test.mp4".to_string());
        assert_eq!(err.to_string(), "Cannot open source: test.mp4");
    }

    #[test]
    fn test_error_serialization() {
        let err = StrideError::Export("no frames processed".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("no frames processed"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: StrideError = io_err.into();
        assert!(matches!(err, StrideError::Io(_)));
    }

    #[test]
    fn test_from_string() {
        let err: StrideError = "test error".into();
        assert!(matches!(err, StrideError::Other(_)));
    }

    #[test]
    fn test_session_errors() {
        let open = StrideError::SourceOpen("webcam 0".to_string());
        assert!(open.to_string().contains("Cannot open source"));

        let annotation = StrideError::Annotation("session run failed".to_string());
        assert!(annotation.to_string().contains("Annotation"));

        let export = StrideError::Export("cannot write out.mkv".to_string());
        assert!(export.to_string().contains("Export"));
    }

    #[test]
    fn test_lock_poisoning_recovery() {
        use std::sync::Mutex;

        let mutex = Mutex::new(42);

        // Poison the mutex by panicking while holding the lock
        let _ = std::panic::catch_unwind(|| {
            let _guard = mutex.lock().unwrap();
            panic!("intentional panic to poison mutex");
        });

        assert!(mutex.lock().is_err());

        let result = mutex.lock().map_lock_err("test_mutex");
        assert!(matches!(result, Err(StrideError::LockPoisoned { .. })));

        if let Err(StrideError::LockPoisoned { context }) = result {
            assert_eq!(context, "test_mutex");
        }
    }

    #[test]
    fn test_result_ext_context() {
        let result: Result<(), &str> = Err("original error");
        let with_context = result.context("operation failed");

        assert!(matches!(with_context, Err(StrideError::Other(_))));
        let msg = with_context.unwrap_err().to_string();
        assert!(msg.contains("operation failed"));
        assert!(msg.contains("original error"));
    }

    #[test]
    fn test_result_ext_ok_passthrough() {
        let result: Result<i32, &str> = Ok(42);
        let with_context = result.context("should not appear");

        assert_eq!(with_context.unwrap(), 42);
    }

    #[test]
    fn test_option_ext_context() {
        let opt: Option<i32> = None;
        let result = opt.context("value was missing");

        assert!(matches!(result, Err(StrideError::Other(_))));
        assert!(result.unwrap_err().to_string().contains("value was missing"));
    }

    #[test]
    fn test_option_ext_with_context() {
        let opt: Option<i32> = None;
        let result = opt.with_context(|| format!("missing value at index {}", 5));

        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("missing value at index 5"));
    }
}
