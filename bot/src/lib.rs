//! deploybot
//!
//! Chat-ops deploy command dispatcher: parses chat commands, resolves the
//! target application, submits builds under a per-application lock and
//! retries contended commands for a bounded window.

pub mod app;
pub mod commands;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod format;
pub mod logs;
pub mod models;
pub mod notify;
pub mod platform;
pub mod queue;
pub mod reporting;
pub mod server;
pub mod storage;
pub mod utils;
pub mod workers;
