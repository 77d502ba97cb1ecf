//! The capability boundary between the coordinator and the site glue.
//!
//! The dispatcher and workers only know `download(index) -> bool` shaped
//! operations; everything browser-specific sits behind [`ItemFetcher`] and
//! [`SessionFactory`]. `GridFetcher` is the production implementation,
//! driving a remote browser over the WebDriver client and inferring
//! completion from the download directory.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::completion::CompletionDetector;
use crate::config::GridpullConfig;
use crate::dispatch::JobIndex;
use crate::error::{DownloadError, InitError};
use crate::session::Session;
use crate::worker::WorkerSpec;

/// One-job-at-a-time item retrieval. Implementations own their session and
/// are driven from a single worker thread.
pub trait ItemFetcher: Send {
    fn fetch(&mut self, index: JobIndex) -> Result<(), DownloadError>;
}

/// Builds a fetcher for one worker: establishes the remote session and
/// navigates to the starting page. Shared across worker threads.
pub trait SessionFactory: Send + Sync {
    fn connect(&self, spec: &WorkerSpec) -> Result<Box<dyn ItemFetcher>, InitError>;
}

/// Production factory: WebDriver session per worker, downloads landing in
/// `<output>/<data_dir_name>`.
pub struct GridSessionFactory {
    cfg: GridpullConfig,
    dataset_url: String,
    download_dir: PathBuf,
}

impl GridSessionFactory {
    pub fn new(
        cfg: GridpullConfig,
        dataset_url: String,
        output_dir: &Path,
        data_dir_name: &str,
    ) -> Self {
        Self {
            cfg,
            dataset_url,
            download_dir: output_dir.join(data_dir_name),
        }
    }
}

impl SessionFactory for GridSessionFactory {
    fn connect(&self, spec: &WorkerSpec) -> Result<Box<dyn ItemFetcher>, InitError> {
        std::fs::create_dir_all(&self.download_dir).map_err(|e| InitError::Session {
            node: spec.node.clone(),
            reason: format!("download dir {}: {}", self.download_dir.display(), e),
        })?;

        let hub = spec.hub_url()?;
        let session = Session::create(&hub, &self.download_dir).map_err(|e| InitError::Session {
            node: spec.node.clone(),
            reason: format!("{e:#}"),
        })?;
        session
            .navigate(&self.dataset_url)
            .map_err(|e| InitError::Navigation {
                url: self.dataset_url.clone(),
                reason: format!("{e:#}"),
            })?;

        Ok(Box::new(GridFetcher {
            session,
            detector: CompletionDetector::from_config(&self.cfg),
            cfg: self.cfg.clone(),
            download_dir: self.download_dir.clone(),
        }))
    }
}

/// Fetches one item: wait for its download link to be present, click it,
/// then wait for the resulting file to appear and settle.
pub struct GridFetcher {
    session: Session,
    detector: CompletionDetector,
    cfg: GridpullConfig,
    download_dir: PathBuf,
}

impl GridFetcher {
    /// Poll for the item's link until the readiness timeout elapses.
    fn wait_for_link(&self, index: JobIndex) -> Result<String, DownloadError> {
        // Page positions are 1-based; job indices start at 0.
        let xpath = self
            .cfg
            .item_link_xpath
            .replace("{index}", &(index + 1).to_string());
        let deadline = Instant::now() + self.cfg.ready_timeout();
        loop {
            match self.session.find_element(&xpath) {
                Ok(Some(element)) => return Ok(element),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        return Err(DownloadError::Timeout {
                            index,
                            timeout: self.cfg.ready_timeout(),
                        });
                    }
                    std::thread::sleep(self.cfg.poll_interval());
                }
                Err(e) => {
                    return Err(DownloadError::Session {
                        index,
                        reason: format!("{e:#}"),
                    })
                }
            }
        }
    }
}

impl ItemFetcher for GridFetcher {
    fn fetch(&mut self, index: JobIndex) -> Result<(), DownloadError> {
        let element = self.wait_for_link(index)?;

        let before = CompletionDetector::snapshot(&self.download_dir);
        self.session
            .click(&element)
            .map_err(|e| DownloadError::Session {
                index,
                reason: format!("{e:#}"),
            })?;

        let path = self
            .detector
            .wait_for_new_file(&self.download_dir, &before, index)?;
        self.detector.wait_until_released(&path)?;
        tracing::debug!(index, file = %path.display(), "download settled");
        Ok(())
    }
}
