use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};
use tierstore_cache::{PromotionTtl, WritePolicy};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Storage validation
        if self.storage.backend == StorageBackend::Postgres {
            let Some(ref pg) = self.storage.postgres else {
                return Err("storage.backend = \"postgres\" requires storage.postgres".into());
            };
            if pg.url.is_none() && pg.host.is_empty() {
                return Err("storage.postgres requires either 'url' or 'host' to be set".into());
            }
            if pg.url.is_none() && pg.database.is_empty() {
                return Err("storage.postgres.database must not be empty".into());
            }
            if pg.pool_size == 0 {
                return Err("storage.postgres.pool_size must be > 0".into());
            }
        }
        // Redis validation
        if self.redis.enabled {
            if self.redis.url.is_empty() {
                return Err("redis.enabled=true requires redis.url".into());
            }
            if self.redis.pool_size == 0 {
                return Err("redis.pool_size must be > 0".into());
            }
            if self.redis.timeout_ms == 0 {
                return Err("redis.timeout_ms must be > 0".into());
            }
        }
        // Cache validation
        if self.cache.request_deadline_ms == 0 {
            return Err("cache.request_deadline_ms must be > 0".into());
        }
        if self.cache.promotion_ttl_secs == 0 {
            return Err("cache.promotion_ttl_secs must be > 0".into());
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// Which record store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process store; data is lost on restart.
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub postgres: Option<PostgresStorageConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresStorageConfig {
    /// Full connection URL. Takes precedence over the individual fields.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_postgres_host")]
    pub host: String,

    #[serde(default = "default_postgres_port")]
    pub port: u16,

    #[serde(default = "default_postgres_user")]
    pub user: String,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_postgres_database")]
    pub database: String,

    #[serde(default = "default_postgres_pool_size")]
    pub pool_size: u32,

    /// Pool acquire timeout in milliseconds
    #[serde(default = "default_postgres_connect_timeout")]
    pub connect_timeout_ms: u64,
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}
fn default_postgres_port() -> u16 {
    5432
}
fn default_postgres_user() -> String {
    "postgres".to_string()
}
fn default_postgres_database() -> String {
    "tierstore".to_string()
}
fn default_postgres_pool_size() -> u32 {
    10
}
fn default_postgres_connect_timeout() -> u64 {
    5000
}

impl PostgresStorageConfig {
    pub fn connection_url(&self) -> String {
        if let Some(ref url) = self.url {
            return url.clone();
        }
        match self.password {
            Some(ref password) => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, password, self.host, self.port, self.database
            ),
            None => format!(
                "postgres://{}@{}:{}/{}",
                self.user, self.host, self.port, self.database
            ),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for PostgresStorageConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_postgres_host(),
            port: default_postgres_port(),
            user: default_postgres_user(),
            password: None,
            database: default_postgres_database(),
            pool_size: default_postgres_pool_size(),
            connect_timeout_ms: default_postgres_connect_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".to_string()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable the Redis tier (gracefully degrades without it)
    /// Default: false (local tier only)
    #[serde(default)]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Pool wait/create/recycle timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    1000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

/// How a value found in a lower tier is written back to the tiers above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionMode {
    /// Always use `promotion_ttl_secs`.
    #[default]
    Fixed,
    /// Reuse the remaining TTL reported by the tier that hit.
    Inherit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicyMode {
    #[default]
    BestEffort,
    Strict,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub promotion: PromotionMode,

    /// TTL for promoted entries, and the fallback for `inherit`
    #[serde(default = "default_promotion_ttl_secs")]
    pub promotion_ttl_secs: u64,

    #[serde(default)]
    pub write_policy: WritePolicyMode,

    /// Promote on a spawned task instead of inside the request
    #[serde(default)]
    pub background_promotion: bool,

    /// Upper bound on the cache work done for one request
    #[serde(default = "default_request_deadline_ms")]
    pub request_deadline_ms: u64,

    #[serde(default = "default_product_ttl_secs")]
    pub product_ttl_secs: u64,

    #[serde(default = "default_user_ttl_secs")]
    pub user_ttl_secs: u64,

    /// TTL of the `<entity>:all` collection entries
    #[serde(default = "default_collection_ttl_secs")]
    pub collection_ttl_secs: u64,
}

fn default_promotion_ttl_secs() -> u64 {
    300
}
fn default_request_deadline_ms() -> u64 {
    500
}
fn default_product_ttl_secs() -> u64 {
    300
}
fn default_user_ttl_secs() -> u64 {
    60
}
fn default_collection_ttl_secs() -> u64 {
    300
}

impl CacheConfig {
    pub fn promotion_ttl(&self) -> PromotionTtl {
        match self.promotion {
            PromotionMode::Fixed => {
                PromotionTtl::Fixed(Duration::from_secs(self.promotion_ttl_secs))
            }
            PromotionMode::Inherit => PromotionTtl::Inherit {
                fallback: Duration::from_secs(self.promotion_ttl_secs),
            },
        }
    }

    pub fn write_policy(&self) -> WritePolicy {
        match self.write_policy {
            WritePolicyMode::BestEffort => WritePolicy::BestEffort,
            WritePolicyMode::Strict => WritePolicy::Strict,
        }
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            promotion: PromotionMode::default(),
            promotion_ttl_secs: default_promotion_ttl_secs(),
            write_policy: WritePolicyMode::default(),
            background_promotion: false,
            request_deadline_ms: default_request_deadline_ms(),
            product_ttl_secs: default_product_ttl_secs(),
            user_ttl_secs: default_user_ttl_secs(),
            collection_ttl_secs: default_collection_ttl_secs(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or("tierstore.toml"));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., TIERSTORE__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("TIERSTORE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
