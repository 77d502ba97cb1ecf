//! `gridpull config` – show the effective configuration.

use anyhow::Result;
use gridpull_core::config::{self, GridpullConfig};

pub fn run_config(cfg: &GridpullConfig) -> Result<()> {
    println!("# {}", config::config_path()?.display());
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
