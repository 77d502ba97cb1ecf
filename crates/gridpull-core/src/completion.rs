//! Download completion detection.
//!
//! A triggered browser download leaves no direct signal; completion is
//! inferred from the filesystem in two phases: wait (bounded) for the file
//! to appear at all, then wait (also bounded) until no process holds it
//! open any more. An in-progress write that never settles within the poll
//! budget is reported as stalled rather than waited on forever.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::GridpullConfig;
use crate::error::DownloadError;

/// Suffixes browsers use for files still being written; such entries never
/// count as an appeared download.
const PARTIAL_SUFFIXES: &[&str] = &["crdownload", "part", "download", "tmp"];

type HeldOpenProbe = Box<dyn Fn(&Path) -> bool + Send + Sync>;

/// Polls the filesystem to decide whether a download has finished.
pub struct CompletionDetector {
    appear_attempts: u32,
    appear_interval: Duration,
    settle_interval: Duration,
    settle_max_polls: u32,
    held_open: HeldOpenProbe,
}

impl CompletionDetector {
    pub fn new(
        appear_attempts: u32,
        appear_interval: Duration,
        settle_interval: Duration,
        settle_max_polls: u32,
    ) -> Self {
        Self {
            appear_attempts,
            appear_interval,
            settle_interval,
            settle_max_polls,
            held_open: Box::new(file_is_held_open),
        }
    }

    pub fn from_config(cfg: &GridpullConfig) -> Self {
        Self::new(
            cfg.appear_attempts,
            cfg.appear_interval(),
            cfg.settle_interval(),
            cfg.settle_max_polls,
        )
    }

    /// Replace the open-holder probe (tests inject deterministic ones).
    pub fn with_probe(mut self, probe: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        self.held_open = Box::new(probe);
        self
    }

    /// Wait for an expected file to exist. `index` only feeds the error.
    pub fn wait_for_appearance(&self, path: &Path, index: u64) -> Result<(), DownloadError> {
        for attempt in 0..self.appear_attempts {
            if path.exists() {
                return Ok(());
            }
            if attempt + 1 < self.appear_attempts {
                std::thread::sleep(self.appear_interval);
            }
        }
        Err(DownloadError::NeverStarted {
            index,
            attempts: self.appear_attempts,
        })
    }

    /// Wait for a file not in `known` to appear in `dir` and return its
    /// path. Partially written files (browser temp suffixes) do not count.
    pub fn wait_for_new_file(
        &self,
        dir: &Path,
        known: &HashSet<OsString>,
        index: u64,
    ) -> Result<PathBuf, DownloadError> {
        for attempt in 0..self.appear_attempts {
            if let Some(path) = first_unknown_entry(dir, known) {
                return Ok(path);
            }
            if attempt + 1 < self.appear_attempts {
                std::thread::sleep(self.appear_interval);
            }
        }
        Err(DownloadError::NeverStarted {
            index,
            attempts: self.appear_attempts,
        })
    }

    /// Wait until no process holds `path` open. Bounded: a file that is
    /// still being written after `settle_max_polls` checks is stalled.
    pub fn wait_until_released(&self, path: &Path) -> Result<(), DownloadError> {
        for _ in 0..self.settle_max_polls {
            if !(self.held_open)(path) {
                return Ok(());
            }
            std::thread::sleep(self.settle_interval);
        }
        Err(DownloadError::Stalled {
            path: path.to_path_buf(),
            polls: self.settle_max_polls,
        })
    }

    /// Names currently present in `dir`, for a pre-download snapshot.
    pub fn snapshot(dir: &Path) -> HashSet<OsString> {
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .flatten()
                    .map(|e| e.file_name())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn is_partial(name: &OsString) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| PARTIAL_SUFFIXES.contains(&e))
        .unwrap_or(false)
}

fn first_unknown_entry(dir: &Path, known: &HashSet<OsString>) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .filter(|e| {
            let name = e.file_name();
            !known.contains(&name) && !is_partial(&name)
        })
        .map(|e| e.path())
        .next()
}

/// True if some process on this machine has `path` open, judged by
/// scanning `/proc/<pid>/fd`. Unreadable pids are skipped, so in practice
/// this sees the current user's processes, which is where the browser's
/// download writer lives when the node runs locally.
#[cfg(unix)]
fn file_is_held_open(path: &Path) -> bool {
    let target = match path.canonicalize() {
        Ok(p) => p,
        Err(_) => return false,
    };
    let proc = match std::fs::read_dir("/proc") {
        Ok(entries) => entries,
        Err(_) => return false,
    };
    for entry in proc.flatten() {
        let name = entry.file_name();
        if !name.to_str().is_some_and(|s| s.bytes().all(|b| b.is_ascii_digit())) {
            continue;
        }
        let fd_dir = entry.path().join("fd");
        let Ok(fds) = std::fs::read_dir(&fd_dir) else {
            continue;
        };
        for fd in fds.flatten() {
            if let Ok(link) = std::fs::read_link(fd.path()) {
                if link == target {
                    return true;
                }
            }
        }
    }
    false
}

/// Without `/proc` there is no portable open-holder check; treat the file
/// as released as soon as it exists.
#[cfg(not(unix))]
fn file_is_held_open(_path: &Path) -> bool {
    false
}
