//! Dispatcher models

pub mod command;
pub mod job;
