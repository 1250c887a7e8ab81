use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

/// Key under which the allow-list lives in Redis.
pub const TENANT_KEY: &str = "allowed_tenants";

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    /// Expiry for the allow-list key in Redis, seconds.
    pub remote_cache_ttl: u64,
    /// Lifetime of the in-process allow-list snapshot, seconds.
    pub local_cache_ttl: u64,
    pub mysql_host: String,
    pub mysql_user: String,
    pub mysql_password: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("RUST_PORT", "3000"),
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1:6379"),
            remote_cache_ttl: try_load("TENANT_REMOTE_TTL", "3600"),
            local_cache_ttl: try_load("TENANT_LOCAL_TTL", "300"),
            mysql_host: try_load("MYSQL_HOST", "localhost:3306"),
            mysql_user: try_load("MYSQL_USER", "usuario"),
            mysql_password: try_load("MYSQL_PASSWORD", "senha"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
