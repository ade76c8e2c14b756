pub mod executor;
pub mod reaper;
