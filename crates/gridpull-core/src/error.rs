//! Error taxonomy for session setup and per-item downloads.
//!
//! Download errors never cross the dispatcher boundary as typed values:
//! the worker converts them into a boolean job outcome after logging, so
//! the dispatcher only ever sees success/failure.

use std::time::Duration;

/// Session/browser setup failed. Fatal to the one worker that hit it;
/// the dispatcher observes it as a `Failure` on that worker's first job.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// The node endpoint could not be parsed into a URL.
    #[error("invalid worker node endpoint {endpoint:?}: {source}")]
    BadEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
    /// The remote automation node rejected or failed session creation.
    #[error("session setup against {node} failed: {reason}")]
    Session { node: String, reason: String },
    /// The initial navigation to the dataset page failed.
    #[error("initial navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
}

/// A single item download failed. Classified so logs can tell a UI that
/// never became ready apart from a download that never started or stalled.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// A UI-readiness precondition did not hold within the bounded wait.
    #[error("element for item {index} not ready within {timeout:?}")]
    Timeout { index: u64, timeout: Duration },
    /// The triggered download never produced a file.
    #[error("download for item {index} never started ({attempts} checks)")]
    NeverStarted { index: u64, attempts: u32 },
    /// The file appeared but was still held open after the bounded wait.
    #[error("download {path:?} stalled: still open after {polls} polls")]
    Stalled { path: std::path::PathBuf, polls: u32 },
    /// The remote session failed mid-item (protocol or transport error).
    #[error("session error while fetching item {index}: {reason}")]
    Session { index: u64, reason: String },
}
