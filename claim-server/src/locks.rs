//! Keyed async mutexes
//!
//! One mutex per user (conversation steps) and one per claim (every claim
//! write). Mutexes are created on first use and dropped once nobody holds or
//! waits on them. When both are needed the user lock is taken first.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lazily created mutex per key
#[derive(Debug)]
pub struct KeyedLocks<K: Eq + Hash> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Wait for the mutex of `key`
    ///
    /// The guard owns its mutex, so it can be held across awaits and outlive
    /// a concurrent [`evict_idle`](Self::evict_idle).
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Drop the mutex of `key` if nobody holds or waits on it
    pub fn evict(&self, key: &K) -> bool {
        self.locks
            .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1)
            .is_some()
    }

    /// Drop every idle mutex, returning how many were removed
    pub fn evict_idle(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        before.saturating_sub(self.locks.len())
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// User and claim lock maps shared by the conversation and the controller
#[derive(Debug, Default)]
pub struct ClaimLocks {
    pub users: KeyedLocks<i64>,
    pub claims: KeyedLocks<String>,
}

impl ClaimLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evict idle locks in both maps
    pub fn evict_idle(&self) -> usize {
        self.users.evict_idle() + self.claims.evict_idle()
    }
}
