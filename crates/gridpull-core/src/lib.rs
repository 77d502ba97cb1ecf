pub mod config;
pub mod logging;

// Core modules
pub mod completion;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod session;
pub mod worker;
