//! CLI command handlers. Each command is in its own file.

mod completions;
mod config;
mod run;

pub use completions::run_completions;
pub use config::run_config;
pub use run::run_scrape;
