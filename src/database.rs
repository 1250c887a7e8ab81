//! Connection plumbing: the shared Redis handle and the per-tenant MySQL
//! pool registry.

use std::{collections::HashMap, time::Duration};

use futures::future::join_all;
use parking_lot::RwLock;
use redis::{
    Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use tracing::{debug, info};

use crate::{config::Config, resolver::DEFAULT_TENANT};

/// Suffix turning a tenant identifier into its physical database name.
pub const DB_SUFFIX: &str = "_db";

pub async fn init_redis(redis_url: &str) -> ConnectionManager {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url).expect("Invalid Redis URL");

    client
        .get_connection_manager_with_config(config)
        .await
        .expect("Redis unreachable at startup")
}

/// `cliente1` -> `cliente1_db`, but `cliente1_db` stays as-is.
pub fn database_name(tenant: &str) -> String {
    if tenant.ends_with(DB_SUFFIX) {
        tenant.to_string()
    } else {
        format!("{tenant}{DB_SUFFIX}")
    }
}

/// Lazily-created MySQL pool per tenant, keyed by the raw tenant string.
///
/// `cliente1` and `cliente1_db` occupy distinct slots even though both map
/// onto the `cliente1_db` database; only the database *name* is normalized.
/// No eviction: the tenant set is admin-curated and small.
pub struct PoolRegistry {
    pools: RwLock<HashMap<String, MySqlPool>>,
    url_base: String,
}

impl PoolRegistry {
    pub fn new(config: &Config) -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
            url_base: format!(
                "mysql://{}:{}@{}",
                config.mysql_user, config.mysql_password, config.mysql_host
            ),
        }
    }

    /// Returns the pool for `tenant`, constructing it on first use.
    ///
    /// Construction happens under the write lock, so concurrent misses for
    /// the same tenant collapse into a single pool. The pool connects
    /// lazily; no network I/O happens here, but constructing it spawns the
    /// pool maintenance task and so requires a Tokio context.
    pub fn get(&self, tenant: &str) -> Result<MySqlPool, sqlx::Error> {
        let tenant = if tenant.is_empty() {
            debug!("No tenant given, substituting {DEFAULT_TENANT}");
            DEFAULT_TENANT
        } else {
            tenant
        };

        if let Some(pool) = self.pools.read().get(tenant) {
            return Ok(pool.clone());
        }

        let mut pools = self.pools.write();
        if let Some(pool) = pools.get(tenant) {
            return Ok(pool.clone());
        }

        info!("Opening database pool for tenant: {tenant}");

        let url = format!("{}/{}", self.url_base, database_name(tenant));
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect_lazy(&url)?;

        pools.insert(tenant.to_string(), pool.clone());

        Ok(pool)
    }

    /// Closes every cached pool concurrently and empties the registry.
    /// Shutdown and test teardown only.
    pub async fn disconnect_all(&self) {
        let pools: Vec<MySqlPool> = self.pools.write().drain().map(|(_, pool)| pool).collect();

        info!("Closing {} database pool(s)", pools.len());
        join_all(pools.iter().map(|pool| pool.close())).await;
    }

    pub fn len(&self) -> usize {
        self.pools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.read().is_empty()
    }
}
