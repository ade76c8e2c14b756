//! Settings and command persistence

pub mod commands;
pub mod settings;
