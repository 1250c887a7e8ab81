use std::{sync::Arc, time::Duration};

use crate::{
    config::{Config, TENANT_KEY},
    database::{PoolRegistry, init_redis},
    tenants::{RedisStore, TenantCache},
};

/// Composition root: every piece of shared mutable state lives here and is
/// injected into handlers, never reached through globals.
pub struct AppState {
    pub config: Config,
    pub tenants: TenantCache,
    pub databases: PoolRegistry,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let redis_connection = init_redis(&config.redis_url).await;
        let store = RedisStore::new(redis_connection, TENANT_KEY, config.remote_cache_ttl);

        let tenants = TenantCache::new(
            Arc::new(store),
            Duration::from_secs(config.local_cache_ttl),
        );
        let databases = PoolRegistry::new(&config);

        Arc::new(Self {
            config,
            tenants,
            databases,
        })
    }
}
