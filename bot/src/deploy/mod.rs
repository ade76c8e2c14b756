//! Deploy command engine

pub mod fsm;
pub mod lock;
pub mod orchestrator;
pub mod retry;
