//! Error handling for inodeploy
//!
//! This module defines the crate-wide error type and a Result alias. Every
//! failure in the deployment pipeline is returned to the caller as one of
//! these variants; nothing here is treated as process-fatal.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for inodeploy operations
#[derive(Error, Debug)]
pub enum DeployError {
    /// No sketch is present in the working directory
    #[error("No artifact present in {0:?}")]
    NoArtifact(PathBuf),

    /// The board-list subprocess could not be run or exited with an error
    #[error("Board detection failed: {0}")]
    BoardDetectionFailed(String),

    /// The compiler exited nonzero; `stderr` is the captured diagnostic text
    #[error("Compilation failed: {stderr}")]
    CompileFailed { code: Option<i32>, stderr: String },

    /// The compiler reported success but produced no image
    #[error("No .{extension} image found in {dir:?} after compilation")]
    ArtifactMissing { dir: PathBuf, extension: String },

    /// Deploy was requested without a selected port
    #[error("No port selected")]
    PortRequired,

    /// Deploy was requested with nothing to send
    #[error("Nothing to send")]
    PayloadRequired,

    /// An image deploy was requested before any successful build
    #[error("No compiled image available, build first")]
    NoImage,

    /// The selected port failed validation
    #[error("Port {0} is not a valid device interface")]
    InvalidPort(String),

    /// The selected port is missing from the latest enumeration
    #[error("Port {0} is no longer available")]
    StalePort(String),

    /// Another transfer currently holds the port
    #[error("Port {0} is busy with another transfer")]
    PortBusy(String),

    /// Opening the serial interface failed
    #[error("Failed to open port {path}: {message}")]
    PortOpenFailed { path: String, message: String },

    /// Writing or draining the payload failed
    #[error("Failed to send data to {path}: {message}")]
    WriteFailed { path: String, message: String },

    /// Reading the payload failed before the transfer started
    #[error("Failed to read {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external tool exceeded its time budget
    #[error("Timeout: {program} did not finish within {after:?}")]
    Timeout { program: String, after: Duration },

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DeployError>,
    },
}

/// Coarse classification of failures for presentation layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid user input (port, artifact); fix and retry
    Input,
    /// A detection or compiler subprocess failed
    ExternalProcess,
    /// Filesystem or serial I/O failed
    Io,
    /// Configuration could not be loaded or saved
    Config,
}

impl DeployError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DeployError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeployError::NoArtifact(_)
            | DeployError::PortRequired
            | DeployError::PayloadRequired
            | DeployError::NoImage
            | DeployError::InvalidPort(_)
            | DeployError::StalePort(_)
            | DeployError::PortBusy(_) => ErrorKind::Input,
            DeployError::BoardDetectionFailed(_)
            | DeployError::CompileFailed { .. }
            | DeployError::ArtifactMissing { .. }
            | DeployError::Timeout { .. } => ErrorKind::ExternalProcess,
            DeployError::PortOpenFailed { .. }
            | DeployError::WriteFailed { .. }
            | DeployError::IoError { .. }
            | DeployError::Io(_) => ErrorKind::Io,
            DeployError::Config(_) => ErrorKind::Config,
            DeployError::WithContext { source, .. } => source.kind(),
        }
    }
}

/// Result type alias for inodeploy operations
pub type Result<T> = std::result::Result<T, DeployError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
