//! Command persistence

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::errors::DispatchError;
use crate::models::command::Command;

/// Persistent store for chat commands
#[async_trait]
pub trait CommandStore: Send + Sync {
    async fn insert(&self, command: Command) -> Result<(), DispatchError>;

    async fn find(&self, id: Uuid) -> Result<Option<Command>, DispatchError>;

    /// Set `processed_at` if it is still unset.
    ///
    /// Returns `true` only for the caller that performed the transition.
    async fn mark_processed(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, DispatchError>;

    /// Evict commands created before `cutoff`, returning how many were removed
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DispatchError>;
}

/// In-memory command store
#[derive(Default)]
pub struct MemoryCommandStore {
    commands: RwLock<HashMap<Uuid, Command>>,
}

impl MemoryCommandStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.commands.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CommandStore for MemoryCommandStore {
    async fn insert(&self, command: Command) -> Result<(), DispatchError> {
        let mut commands = self.commands.write().await;
        commands.insert(command.id, command);
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Command>, DispatchError> {
        Ok(self.commands.read().await.get(&id).cloned())
    }

    async fn mark_processed(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, DispatchError> {
        let mut commands = self.commands.write().await;
        let command = commands
            .get_mut(&id)
            .ok_or_else(|| DispatchError::Internal(format!("unknown command {}", id)))?;

        if command.processed_at.is_some() {
            debug!("Command {} already processed", id);
            return Ok(false);
        }

        command.processed_at = Some(at);
        Ok(true)
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DispatchError> {
        let mut commands = self.commands.write().await;
        let before = commands.len();
        commands.retain(|_, command| command.created_at >= cutoff);
        Ok(before - commands.len())
    }
}
