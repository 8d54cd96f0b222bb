//! Configuration values for the cache and its HTTP transport
//!
//! Both types are plain values fixed at construction time. The CLI builds them
//! from arguments; library users start from `Default` and override fields
//! with the `with_*` methods.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;

/// Handle API endpoint queried for DOIs
pub const DEFAULT_ENDPOINT: &str = "https://doi.org/api/handles";

/// Entries older than this are refetched (120 days)
pub const DEFAULT_TTL: Duration = Duration::from_secs(120 * 24 * 60 * 60);

/// Default LMDB map size (upper bound of the data file), 1 GiB
pub const DEFAULT_MAP_SIZE: usize = 1024 * 1024 * 1024;

/// Settings of the cache engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Base URL the key is appended to; trailing slashes are ignored
    pub endpoint: String,
    /// How long a fetched entry stays fresh
    pub ttl: Duration,
    /// LMDB map size in bytes used by [`Cache::open`](crate::Cache::open)
    pub map_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            ttl: DEFAULT_TTL,
            map_size: DEFAULT_MAP_SIZE,
        }
    }
}

impl CacheConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_map_size(mut self, map_size: usize) -> Self {
        self.map_size = map_size;
        self
    }

    /// Builds the request URL for `key`
    ///
    /// The key is appended verbatim, so DOIs keep their slashes.
    pub fn request_url(&self, key: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), key)
    }
}

/// Settings of [`HttpTransport`](crate::transport::HttpTransport)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Total timeout of a single request attempt
    pub timeout: Duration,
    /// Additional attempts after a failed or 429/5xx request
    pub max_retries: u32,
    /// Pause before the first retry; grows linearly with each attempt
    pub backoff: Duration,
    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff: Duration::from_secs(1),
            user_agent: concat!("doicache/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Default database directory
///
/// Uses `~/.cache/doicache/default` on Linux, or the equivalent platform cache
/// directory elsewhere. Returns `None` if no home directory can be determined.
pub fn default_db_path() -> Option<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "doicache")?;
    Some(project_dirs.cache_dir().join("default"))
}
