//! Deployment platform wire models.

pub mod models;

pub use models::*;
