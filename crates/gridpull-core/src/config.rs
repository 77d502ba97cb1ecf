use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::dispatch::FailurePolicy;

/// Global configuration loaded from `~/.config/gridpull/config.toml`.
///
/// Built once at the entry point and passed by reference into the
/// dispatcher and workers; there is no process-wide mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridpullConfig {
    /// Seconds a worker sleeps between polls of an empty job queue.
    pub poll_interval_secs: u64,
    /// Seconds to wait for a page element to become clickable.
    pub ready_timeout_secs: u64,
    /// How many times to check for the downloaded file to appear.
    pub appear_attempts: u32,
    /// Seconds between appearance checks.
    pub appear_interval_secs: u64,
    /// Seconds between "is the file still open" checks.
    pub settle_interval_secs: u64,
    /// Upper bound on "still open" checks before the download counts as stalled.
    pub settle_max_polls: u32,
    /// What a worker failure means: "exhausted" retires the worker and drops
    /// the index (source-compatible); "retry" retires the worker but re-queues
    /// the failed index for the remaining workers.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Dataset page URL template; `{dataset}` is replaced by the dataset id.
    pub dataset_url_template: String,
    /// XPath template locating the download link for one item; `{index}` is
    /// replaced by the 1-based position of the item on the page.
    pub item_link_xpath: String,
}

impl Default for GridpullConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 1,
            ready_timeout_secs: 10,
            appear_attempts: 60,
            appear_interval_secs: 1,
            settle_interval_secs: 1,
            settle_max_polls: 600,
            failure_policy: FailurePolicy::default(),
            dataset_url_template:
                "https://easy.dans.knaw.nl/ui/datasets/id/easy-dataset:{dataset}/tab/2"
                    .to_string(),
            item_link_xpath: "(//a[contains(@class, 'downloadLink')])[{index}]".to_string(),
        }
    }
}

impl GridpullConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn appear_interval(&self) -> Duration {
        Duration::from_secs(self.appear_interval_secs)
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_secs(self.settle_interval_secs)
    }

    /// Expand the dataset URL template for a concrete dataset id.
    pub fn dataset_url(&self, dataset: &str) -> String {
        self.dataset_url_template.replace("{dataset}", dataset)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("gridpull")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<GridpullConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = GridpullConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: GridpullConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = GridpullConfig::default();
        assert_eq!(cfg.poll_interval_secs, 1);
        assert_eq!(cfg.ready_timeout_secs, 10);
        assert_eq!(cfg.appear_attempts, 60);
        assert_eq!(cfg.settle_max_polls, 600);
        assert_eq!(cfg.failure_policy, FailurePolicy::TreatAsExhausted);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = GridpullConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: GridpullConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.poll_interval_secs, cfg.poll_interval_secs);
        assert_eq!(parsed.appear_attempts, cfg.appear_attempts);
        assert_eq!(parsed.failure_policy, cfg.failure_policy);
        assert_eq!(parsed.dataset_url_template, cfg.dataset_url_template);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            poll_interval_secs = 2
            ready_timeout_secs = 30
            appear_attempts = 10
            appear_interval_secs = 3
            settle_interval_secs = 5
            settle_max_polls = 20
            failure_policy = "retry"
            dataset_url_template = "https://example.org/d/{dataset}"
            item_link_xpath = "//a[{index}]"
        "#;
        let cfg: GridpullConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.poll_interval_secs, 2);
        assert_eq!(cfg.settle_max_polls, 20);
        assert_eq!(cfg.failure_policy, FailurePolicy::RetryElsewhere);
        assert_eq!(cfg.dataset_url("42"), "https://example.org/d/42");
    }

    #[test]
    fn config_toml_failure_policy_defaults_when_missing() {
        let toml = r#"
            poll_interval_secs = 1
            ready_timeout_secs = 10
            appear_attempts = 60
            appear_interval_secs = 1
            settle_interval_secs = 1
            settle_max_polls = 600
            dataset_url_template = "https://example.org/d/{dataset}"
            item_link_xpath = "//a[{index}]"
        "#;
        let cfg: GridpullConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.failure_policy, FailurePolicy::TreatAsExhausted);
    }

    #[test]
    fn dataset_url_expands_template() {
        let cfg = GridpullConfig::default();
        let url = cfg.dataset_url("112935");
        assert!(url.contains("easy-dataset:112935"));
        assert!(!url.contains("{dataset}"));
    }
}
