//! Per-application deploy locks

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// A held lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub key: String,
    pub holder_token: Uuid,
    pub acquired_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl Lock {
    pub fn expires_at(&self) -> DateTime<Utc> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        self.acquired_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// Result of a lock attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    /// The caller now holds the lock
    Granted(Lock),
    /// Someone else holds an unexpired lock
    AlreadyHeld(Lock),
}

impl LockOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, LockOutcome::Granted(_))
    }
}

/// Non-blocking mutual exclusion keyed by application id
#[derive(Debug, Default)]
pub struct LockManager {
    locks: RwLock<HashMap<String, Lock>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the lock for `key`. Never waits; an expired lock is replaced.
    pub fn acquire(&self, key: &str, ttl: Duration) -> LockOutcome {
        let now = Utc::now();
        let mut locks = self.locks.write().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = locks.get(key) {
            if !existing.is_expired(now) {
                debug!("Lock {} already held by {}", key, existing.holder_token);
                return LockOutcome::AlreadyHeld(existing.clone());
            }
            debug!("Replacing expired lock {}", key);
        }

        let lock = Lock {
            key: key.to_string(),
            holder_token: Uuid::new_v4(),
            acquired_at: now,
            ttl,
        };
        locks.insert(key.to_string(), lock.clone());
        LockOutcome::Granted(lock)
    }

    /// Drop the lock for `key`. Releasing an unheld key is a no-op.
    pub fn release(&self, key: &str) {
        let mut locks = self.locks.write().unwrap_or_else(|e| e.into_inner());
        if locks.remove(key).is_some() {
            debug!("Released lock {}", key);
        }
    }

    /// Release only if `token` still holds the lock.
    ///
    /// Returns whether a lock was released.
    pub fn release_if_held_by(&self, key: &str, token: Uuid) -> bool {
        let mut locks = self.locks.write().unwrap_or_else(|e| e.into_inner());
        match locks.get(key) {
            Some(lock) if lock.holder_token == token => {
                locks.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Current unexpired holder of `key`
    pub fn holder(&self, key: &str) -> Option<Lock> {
        let locks = self.locks.read().unwrap_or_else(|e| e.into_inner());
        locks
            .get(key)
            .filter(|lock| !lock.is_expired(Utc::now()))
            .cloned()
    }

    /// Forget expired locks, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut locks = self.locks.write().unwrap_or_else(|e| e.into_inner());
        let before = locks.len();
        locks.retain(|_, lock| !lock.is_expired(now));
        before - locks.len()
    }

    pub fn len(&self) -> usize {
        let locks = self.locks.read().unwrap_or_else(|e| e.into_inner());
        locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
