//! Allow-list of routable tenants.
//!
//! Two-tier cache over the authoritative list: an in-process snapshot with a
//! short TTL, then Redis with a longer expiry, then a compiled-in default
//! list. The remote layer sits behind [`TenantStore`] so the cache logic can
//! be exercised against in-memory and failing stores.
//!
//! Store unavailability is deliberately invisible to request handling: a
//! stale or default tenant list routes traffic, a missing one rejects all of
//! it.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use parking_lot::RwLock;
use redis::{AsyncCommands, aio::ConnectionManager};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::resolver::DEFAULT_TENANT;

/// Fallback used when neither cache tier can produce a list.
pub const DEFAULT_TENANTS: [&str; 4] = ["cliente1_db", "cliente2_db", "cliente3_db", "default"];

pub fn default_tenants() -> Vec<String> {
    DEFAULT_TENANTS.iter().map(|t| t.to_string()).collect()
}

/// Admin-created tenant names: letters, digits and underscore only.
pub fn is_valid_tenant_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("invalid tenant list payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Remote tier of the allow-list cache.
///
/// `read` distinguishes a miss (`Ok(None)`) from a failure (`Err`): a miss
/// triggers seeding the store with the default list, a failure does not.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn read(&self) -> Result<Option<Vec<String>>, StoreError>;
    async fn write(&self, tenants: &[String]) -> Result<(), StoreError>;
}

/// Production [`TenantStore`]: one Redis string key holding the
/// JSON-encoded list, written with an expiry.
pub struct RedisStore {
    connection: ConnectionManager,
    key: String,
    expiry_seconds: u64,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager, key: &str, expiry_seconds: u64) -> Self {
        Self {
            connection,
            key: key.to_string(),
            expiry_seconds,
        }
    }
}

#[async_trait]
impl TenantStore for RedisStore {
    async fn read(&self) -> Result<Option<Vec<String>>, StoreError> {
        let mut connection = self.connection.clone();
        let payload: Option<String> = connection.get(&self.key).await?;

        match payload {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn write(&self, tenants: &[String]) -> Result<(), StoreError> {
        let payload = serde_json::to_string(tenants)?;

        let mut connection = self.connection.clone();
        connection
            .set_ex::<_, _, ()>(&self.key, payload, self.expiry_seconds)
            .await?;

        Ok(())
    }
}

struct Snapshot {
    tenants: Vec<String>,
    fetched_at: Instant,
}

pub struct TenantCache {
    store: Arc<dyn TenantStore>,
    local: RwLock<Option<Snapshot>>,
    local_ttl: Duration,
}

impl TenantCache {
    pub fn new(store: Arc<dyn TenantStore>, local_ttl: Duration) -> Self {
        Self {
            store,
            local: RwLock::new(None),
            local_ttl,
        }
    }

    /// Read path: fresh local snapshot, then the store, then the compiled-in
    /// defaults. Never fails.
    pub async fn get_allowed(&self) -> Vec<String> {
        {
            let local = self.local.read();
            if let Some(snapshot) = local.as_ref() {
                if snapshot.fetched_at.elapsed() < self.local_ttl {
                    return snapshot.tenants.clone();
                }
            }
        }

        match self.store.read().await {
            Ok(Some(tenants)) if !tenants.is_empty() => self.refresh_local(tenants),
            Ok(_) => {
                // Key absent: seed the store so later reads hit it.
                let defaults = default_tenants();
                if let Err(e) = self.store.write(&defaults).await {
                    warn!("Failed to seed tenant list: {e}");
                }
                self.refresh_local(defaults)
            }
            Err(e) => {
                warn!("Tenant store unavailable, serving default list: {e}");
                self.refresh_local(default_tenants())
            }
        }
    }

    pub async fn is_allowed(&self, tenant: &str) -> bool {
        self.get_allowed().await.iter().any(|t| t == tenant)
    }

    pub async fn add(&self, tenant: &str) -> bool {
        let mut tenants = self.get_allowed().await;

        if tenants.iter().any(|t| t == tenant) {
            debug!("Tenant {tenant} already allowed");
            return true;
        }

        tenants.push(tenant.to_string());
        self.persist(tenants).await
    }

    pub async fn remove(&self, tenant: &str) -> bool {
        if tenant == DEFAULT_TENANT {
            warn!("Refusing to remove the default tenant");
            return false;
        }

        let tenants = self
            .get_allowed()
            .await
            .into_iter()
            .filter(|t| t != tenant)
            .collect();

        self.persist(tenants).await
    }

    pub async fn replace(&self, mut tenants: Vec<String>) -> bool {
        if !tenants.iter().any(|t| t == DEFAULT_TENANT) {
            tenants.push(DEFAULT_TENANT.to_string());
        }

        self.persist(tenants).await
    }

    async fn persist(&self, tenants: Vec<String>) -> bool {
        match self.store.write(&tenants).await {
            Ok(()) => {
                self.refresh_local(tenants);
                true
            }
            Err(e) => {
                error!("Failed to persist tenant list: {e}");
                false
            }
        }
    }

    fn refresh_local(&self, tenants: Vec<String>) -> Vec<String> {
        *self.local.write() = Some(Snapshot {
            tenants: tenants.clone(),
            fetched_at: Instant::now(),
        });

        tenants
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    /// In-memory [`TenantStore`] mirroring the Redis key semantics.
    pub struct MemoryStore {
        tenants: Mutex<Option<Vec<String>>>,
        reads: AtomicUsize,
    }

    impl MemoryStore {
        pub fn empty() -> Self {
            Self {
                tenants: Mutex::new(None),
                reads: AtomicUsize::new(0),
            }
        }

        pub fn with(tenants: &[&str]) -> Self {
            Self {
                tenants: Mutex::new(Some(tenants.iter().map(|t| t.to_string()).collect())),
                reads: AtomicUsize::new(0),
            }
        }

        pub fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }

        pub fn contents(&self) -> Option<Vec<String>> {
            self.tenants.lock().clone()
        }
    }

    #[async_trait]
    impl TenantStore for MemoryStore {
        async fn read(&self) -> Result<Option<Vec<String>>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.tenants.lock().clone())
        }

        async fn write(&self, tenants: &[String]) -> Result<(), StoreError> {
            *self.tenants.lock() = Some(tenants.to_vec());
            Ok(())
        }
    }

    /// [`TenantStore`] whose every operation fails, as an unreachable Redis
    /// would.
    pub struct FailingStore;

    fn offline() -> StoreError {
        StoreError::Redis(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "store offline",
        )))
    }

    #[async_trait]
    impl TenantStore for FailingStore {
        async fn read(&self) -> Result<Option<Vec<String>>, StoreError> {
            Err(offline())
        }

        async fn write(&self, _tenants: &[String]) -> Result<(), StoreError> {
            Err(offline())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FailingStore, MemoryStore};
    use super::*;

    fn cache(store: Arc<dyn TenantStore>) -> TenantCache {
        TenantCache::new(store, Duration::from_secs(300))
    }

    #[tokio::test]
    async fn store_miss_serves_defaults_and_seeds_the_store() {
        let store = Arc::new(MemoryStore::empty());
        let tenants = cache(store.clone()).get_allowed().await;

        assert_eq!(tenants, default_tenants());
        assert_eq!(store.contents(), Some(default_tenants()));
    }

    #[tokio::test]
    async fn store_failure_serves_defaults_without_raising() {
        let tenants = cache(Arc::new(FailingStore)).get_allowed().await;

        assert_eq!(tenants, default_tenants());
    }

    #[tokio::test]
    async fn fresh_snapshot_short_circuits_the_store() {
        let store = Arc::new(MemoryStore::with(&["cliente1", "default"]));
        let cache = cache(store.clone());

        cache.get_allowed().await;
        cache.get_allowed().await;

        assert_eq!(store.reads(), 1);
    }

    #[tokio::test]
    async fn expired_snapshot_reads_through() {
        let store = Arc::new(MemoryStore::with(&["cliente1", "default"]));
        let cache = TenantCache::new(store.clone(), Duration::ZERO);

        cache.get_allowed().await;
        cache.get_allowed().await;

        assert_eq!(store.reads(), 2);
    }

    #[tokio::test]
    async fn add_then_remove_round_trip() {
        let store = Arc::new(MemoryStore::with(&["default"]));
        let cache = cache(store);

        assert!(cache.add("cliente9").await);
        assert!(cache.is_allowed("cliente9").await);

        assert!(cache.remove("cliente9").await);
        assert!(!cache.is_allowed("cliente9").await);
    }

    #[tokio::test]
    async fn add_is_a_no_op_for_known_tenants() {
        let store = Arc::new(MemoryStore::with(&["cliente1", "default"]));
        let cache = cache(store);

        assert!(cache.add("cliente1").await);
        assert_eq!(cache.get_allowed().await, vec!["cliente1", "default"]);
    }

    #[tokio::test]
    async fn removing_the_default_tenant_is_refused() {
        let store = Arc::new(MemoryStore::with(&["cliente1", "default"]));
        let cache = cache(store);

        assert!(!cache.remove("default").await);
        assert!(cache.is_allowed("default").await);
    }

    #[tokio::test]
    async fn failed_mutation_reports_false_and_keeps_the_snapshot() {
        let store = Arc::new(FailingStore);
        let cache = cache(store);

        // Failure path primed the snapshot with the defaults.
        cache.get_allowed().await;

        assert!(!cache.add("cliente9").await);
        assert_eq!(cache.get_allowed().await, default_tenants());
    }

    #[tokio::test]
    async fn replace_reinserts_the_default_tenant() {
        let store = Arc::new(MemoryStore::with(&["default"]));
        let cache = cache(store);

        assert!(cache.replace(vec!["cliente7".to_string()]).await);

        let tenants = cache.get_allowed().await;
        assert_eq!(tenants, vec!["cliente7", "default"]);
    }

    #[test]
    fn tenant_name_validation() {
        assert!(is_valid_tenant_name("cliente1_db"));
        assert!(is_valid_tenant_name("Tenant42"));
        assert!(!is_valid_tenant_name(""));
        assert!(!is_valid_tenant_name("bad name"));
        assert!(!is_valid_tenant_name("bad-name"));
        assert!(!is_valid_tenant_name("tenant;drop"));
    }
}
