//! Chat payload models shared by the deploybot server and its clients.

pub mod models;

pub use models::*;
