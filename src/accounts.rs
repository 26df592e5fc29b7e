//! Entity store: cached user accounts mirrored write-through to a [`RecordStore`].
//!
//! The in-memory map is authoritative for reads; the backend holds one full record per user
//! and is rewritten on every mutation. Mutations follow a strict order: encode, write the
//! durable record, and only then replace the cached copy, so a failed write never leaves a
//! change visible in memory.
//!
//! Read-modify-write sequences are serialized per user through [`AccountStore::lock`], which
//! hands out a [`UserGuard`]. Mutating calls take that guard as proof the caller holds the
//! user's shard.

use crate::error::QuotaError;
use crate::locks::{ShardedLocks, DEFAULT_SHARDS};
use crate::model::{validate_user_id, MembershipTier, QuotaCounter, ResourceCategory, UserAccount};
use crate::store::RecordStore;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tokio::sync::MutexGuard;
use tracing::{debug, info, warn};

/// Exclusive access to one user's state, obtained from [`AccountStore::lock`].
#[derive(Debug)]
pub struct UserGuard<'a> {
    user_id: String,
    _shard: MutexGuard<'a, ()>,
}

impl UserGuard<'_> {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[derive(Debug)]
pub struct AccountStore<S> {
    backend: S,
    cache: RwLock<HashMap<String, UserAccount>>,
    locks: ShardedLocks,
}

impl<S: RecordStore> AccountStore<S> {
    pub fn new(backend: S) -> Self {
        Self::with_shards(backend, DEFAULT_SHARDS)
    }

    pub fn with_shards(backend: S, shards: usize) -> Self {
        Self { backend, cache: RwLock::new(HashMap::new()), locks: ShardedLocks::new(shards) }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Number of accounts currently cached.
    pub fn cached_len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Serialize against every other mutation of `user_id`.
    pub async fn lock(&self, user_id: &str) -> UserGuard<'_> {
        let shard = self.locks.lock(user_id).await;
        UserGuard { user_id: user_id.to_string(), _shard: shard }
    }

    /// Create an account with empty counters.
    ///
    /// Fails with `AlreadyRegistered` if the id is cached or a durable record exists, whether
    /// or not that record still decodes.
    pub async fn register(
        &self,
        user_id: &str,
        tier: MembershipTier,
    ) -> Result<UserAccount, QuotaError> {
        validate_user_id(user_id)?;
        let guard = self.lock(user_id).await;

        let already = self.cached(user_id).is_some()
            || self
                .backend
                .read(user_id)
                .await
                .map_err(|e| QuotaError::storage(user_id, e))?
                .is_some();
        if already {
            return Err(QuotaError::AlreadyRegistered { user_id: user_id.to_string() });
        }

        let account = UserAccount::new(tier);
        self.persist(&guard, account.clone()).await?;
        info!(target: "tierquota::accounts", user_id, tier = %tier, "user registered");
        Ok(account)
    }

    /// Cached account, hydrating from the backend on a miss.
    ///
    /// A miss takes the user's lock, so a concurrent [`reset`](Self::reset) either runs before
    /// the read or clears what it cached.
    pub async fn get(&self, user_id: &str) -> Result<Option<UserAccount>, QuotaError> {
        validate_user_id(user_id)?;
        if let Some(account) = self.cached(user_id) {
            return Ok(Some(account));
        }
        let guard = self.lock(user_id).await;
        self.get_locked(&guard).await
    }

    /// [`get`](Self::get) for a caller already holding the user's guard.
    pub async fn get_locked(&self, guard: &UserGuard<'_>) -> Result<Option<UserAccount>, QuotaError> {
        let user_id = guard.user_id();
        validate_user_id(user_id)?;
        if let Some(account) = self.cached(user_id) {
            return Ok(Some(account));
        }

        let Some(bytes) =
            self.backend.read(user_id).await.map_err(|e| QuotaError::storage(user_id, e))?
        else {
            return Ok(None);
        };
        let account: UserAccount = serde_json::from_slice(&bytes).map_err(|e| {
            warn!(target: "tierquota::accounts", user_id, error = %e, "corrupt durable record");
            QuotaError::corrupt(user_id, e)
        })?;

        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.to_string(), account.clone());
        debug!(target: "tierquota::accounts", user_id, "account hydrated from storage");
        Ok(Some(account))
    }

    /// Replace one category counter and rewrite the full record.
    pub async fn update(
        &self,
        user_id: &str,
        category: ResourceCategory,
        counter: QuotaCounter,
    ) -> Result<UserAccount, QuotaError> {
        let guard = self.lock(user_id).await;
        self.update_locked(&guard, category, counter).await
    }

    /// [`update`](Self::update) for a caller already holding the user's guard.
    pub async fn update_locked(
        &self,
        guard: &UserGuard<'_>,
        category: ResourceCategory,
        counter: QuotaCounter,
    ) -> Result<UserAccount, QuotaError> {
        let user_id = guard.user_id();
        let mut account = self
            .get_locked(guard)
            .await?
            .ok_or_else(|| QuotaError::UserNotFound { user_id: user_id.to_string() })?;
        account.quota_state.insert(category, counter);
        self.persist(guard, account.clone()).await?;
        Ok(account)
    }

    /// Drop every durable record and empty the cache.
    pub async fn reset(&self) -> Result<(), QuotaError> {
        let _all = self.locks.lock_all().await;
        self.backend.clear().await.map_err(|e| QuotaError::storage("*", e))?;
        self.cache.write().unwrap_or_else(PoisonError::into_inner).clear();
        info!(target: "tierquota::accounts", "account store reset");
        Ok(())
    }

    fn cached(&self, user_id: &str) -> Option<UserAccount> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).get(user_id).cloned()
    }

    async fn persist(&self, guard: &UserGuard<'_>, account: UserAccount) -> Result<(), QuotaError> {
        let user_id = guard.user_id();
        let bytes = serde_json::to_vec(&account).map_err(|e| {
            QuotaError::storage(user_id, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        if let Err(e) = self.backend.write(user_id, &bytes).await {
            warn!(target: "tierquota::accounts", user_id, error = %e, "durable write failed");
            return Err(QuotaError::storage(user_id, e));
        }
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.to_string(), account);
        Ok(())
    }
}
