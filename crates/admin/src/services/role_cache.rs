//! Read-through cache of profile roles.
//!
//! Every authenticated admin request resolves the caller's role, so roles
//! are cached for a short TTL. With `REDIS_URL` set the cache is shared
//! between admin instances (`kedai:role:{profile_id}`, `SET EX`); otherwise
//! an in-process moka cache is used.
//!
//! Redis is never a hard dependency: any Redis error falls through to the
//! database and is logged.

use std::time::Duration;

use moka::future::Cache;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use tracing::{debug, warn};

use kedai_core::{ProfileId, Role};

use crate::config::RoleCacheConfig;
use crate::db::{ProfileRepository, RepositoryError};

/// Bound on any single Redis round trip before falling back to the database.
const REDIS_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Clone)]
enum Backend {
    Redis(ConnectionManager),
    Memory(Cache<ProfileId, Role>),
}

/// Profile role cache.
#[derive(Clone)]
pub struct RoleCache {
    backend: Backend,
    ttl: Duration,
}

/// Redis key for a profile's cached role.
#[must_use]
pub fn cache_key(profile_id: ProfileId) -> String {
    format!("kedai:role:{profile_id}")
}

impl RoleCache {
    /// Connect to Redis when configured, otherwise use the in-process cache.
    ///
    /// # Errors
    ///
    /// Returns error if the Redis URL is invalid or the first connection fails.
    pub async fn connect(config: &RoleCacheConfig) -> Result<Self, redis::RedisError> {
        let Some(url) = &config.redis_url else {
            return Ok(Self::in_memory(config.ttl));
        };

        let client = redis::Client::open(url.expose_secret())?;
        let manager = client.get_connection_manager().await?;
        tracing::info!(ttl_secs = config.ttl.as_secs(), "Role cache backed by Redis");

        Ok(Self {
            backend: Backend::Redis(manager),
            ttl: config.ttl,
        })
    }

    /// In-process cache only.
    #[must_use]
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            backend: Backend::Memory(
                Cache::builder()
                    .max_capacity(10_000)
                    .time_to_live(ttl)
                    .build(),
            ),
            ttl,
        }
    }

    /// `"redis"` or `"memory"`, for the readiness report.
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Redis(_) => "redis",
            Backend::Memory(_) => "memory",
        }
    }

    /// Current role of a profile, or `None` if the profile no longer exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` only when the database read fails.
    pub async fn role_of(
        &self,
        pool: &PgPool,
        profile_id: ProfileId,
    ) -> Result<Option<Role>, RepositoryError> {
        if let Some(role) = self.get(profile_id).await {
            debug!(%profile_id, "Role cache hit");
            return Ok(Some(role));
        }

        let role = ProfileRepository::new(pool).role_of(profile_id).await?;
        if let Some(role) = role {
            self.put(profile_id, role).await;
        }
        Ok(role)
    }

    /// Drop a cached role after it changed.
    pub async fn invalidate(&self, profile_id: ProfileId) {
        match &self.backend {
            Backend::Memory(cache) => cache.invalidate(&profile_id).await,
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                let result = tokio::time::timeout(
                    REDIS_TIMEOUT,
                    conn.del::<_, ()>(cache_key(profile_id)),
                )
                .await;
                if !matches!(result, Ok(Ok(()))) {
                    warn!(%profile_id, "Failed to invalidate cached role in Redis");
                }
            }
        }
    }

    async fn get(&self, profile_id: ProfileId) -> Option<Role> {
        match &self.backend {
            Backend::Memory(cache) => cache.get(&profile_id).await,
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                let result = tokio::time::timeout(
                    REDIS_TIMEOUT,
                    conn.get::<_, Option<String>>(cache_key(profile_id)),
                )
                .await;
                match result {
                    Ok(Ok(value)) => value.and_then(|v| v.parse().ok()),
                    Ok(Err(e)) => {
                        warn!(error = %e, "Redis role lookup failed, reading database");
                        None
                    }
                    Err(_) => {
                        warn!("Redis role lookup timed out, reading database");
                        None
                    }
                }
            }
        }
    }

    async fn put(&self, profile_id: ProfileId, role: Role) {
        match &self.backend {
            Backend::Memory(cache) => cache.insert(profile_id, role).await,
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                let ttl_secs = self.ttl.as_secs().max(1);
                let result = tokio::time::timeout(
                    REDIS_TIMEOUT,
                    conn.set_ex::<_, _, ()>(cache_key(profile_id), role.as_str(), ttl_secs),
                )
                .await;
                if !matches!(result, Ok(Ok(()))) {
                    warn!(%profile_id, "Failed to cache role in Redis");
                }
            }
        }
    }
}

impl std::fmt::Debug for RoleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match self.backend {
            Backend::Redis(_) => "redis",
            Backend::Memory(_) => "memory",
        };
        f.debug_struct("RoleCache")
            .field("backend", &backend)
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_format() {
        let id = ProfileId::from_uuid(uuid::Uuid::nil());
        assert_eq!(
            cache_key(id),
            "kedai:role:00000000-0000-0000-0000-000000000000"
        );
    }

    #[tokio::test]
    async fn test_memory_backend_roundtrip_and_invalidate() {
        let cache = RoleCache::in_memory(Duration::from_secs(60));
        let id = ProfileId::generate();

        assert_eq!(cache.get(id).await, None);
        cache.put(id, Role::Staff).await;
        assert_eq!(cache.get(id).await, Some(Role::Staff));
        cache.invalidate(id).await;
        assert_eq!(cache.get(id).await, None);
    }
}
