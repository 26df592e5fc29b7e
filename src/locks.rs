//! Sharded lock table serializing read-modify-write sequences per user id.
//!
//! Keys hash onto a fixed set of async mutexes, so the table never grows and unrelated users
//! only contend when they land on the same shard.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tokio::sync::{Mutex, MutexGuard};

/// Shard count used when none is configured.
pub const DEFAULT_SHARDS: usize = 64;

#[derive(Debug)]
pub struct ShardedLocks {
    shards: Box<[Mutex<()>]>,
}

impl Default for ShardedLocks {
    fn default() -> Self {
        Self::new(DEFAULT_SHARDS)
    }
}

impl ShardedLocks {
    /// A shard count of zero is bumped to one.
    pub fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1)).map(|_| Mutex::new(())).collect();
        Self { shards }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shard_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    /// Wait for exclusive access to the shard owning `key`.
    pub async fn lock(&self, key: &str) -> MutexGuard<'_, ()> {
        let idx = self.shard_for(key);
        self.shards[idx].lock().await
    }

    /// Take every shard in index order. Single-key holders never take a second shard, so the
    /// fixed order cannot deadlock.
    pub async fn lock_all(&self) -> Vec<MutexGuard<'_, ()>> {
        let mut guards = Vec::with_capacity(self.shards.len());
        for shard in self.shards.iter() {
            guards.push(shard.lock().await);
        }
        guards
    }
}
