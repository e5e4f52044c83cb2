//! Generation-aware caching of query results.
//!
//! Every entry is tagged with the generation of the snapshot that produced
//! it. A lookup only hits when the caller's pinned generation matches, so a
//! reload invalidates the whole cache without touching it.

use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use thiserror::Error;
use url::Url;

use crate::engine::{Generation, QueryOutput};

mod cached;
mod fingerprint;
mod memory;
#[cfg(feature = "redis")]
mod remote;

pub use cached::CachedEngine;
pub use fingerprint::Fingerprint;
pub use memory::{CacheEntry, MemoryCache, NoopCache};
#[cfg(feature = "redis")]
pub use remote::RedisCache;

/// Time-to-live applied to Redis entries when the URL names none (30 days).
pub const DEFAULT_REDIS_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Errors raised by cache backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The backend could not serve the request.
    #[error("cache unavailable: {message}")]
    Unavailable {
        /// Backend diagnostic.
        message: String,
    },
    /// The configured URL names a backend this build does not provide.
    #[error("unsupported cache backend {scheme:?}")]
    UnsupportedBackend {
        /// URL scheme that was requested.
        scheme: String,
    },
    /// The configured URL could not be parsed.
    #[error("invalid cache URL {url:?}: {message}")]
    InvalidUrl {
        /// URL as configured.
        url: String,
        /// Parser diagnostic.
        message: String,
    },
}

/// Storage for query results keyed by fingerprint and generation.
pub trait QueryCache: Send + Sync {
    /// Return the result stored for `fingerprint`, but only if it was
    /// produced by `generation`.
    fn get(
        &self,
        fingerprint: &Fingerprint,
        generation: Generation,
    ) -> Result<Option<Arc<QueryOutput>>, CacheError>;

    /// Store `payload` as produced by `generation`. The last write wins.
    fn put(
        &self,
        fingerprint: Fingerprint,
        generation: Generation,
        payload: Arc<QueryOutput>,
    ) -> Result<(), CacheError>;

    /// Drop every entry, returning how many were removed.
    fn clear(&self) -> Result<usize, CacheError>;
}

/// Cache backend selected by URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    /// [`MemoryCache`] with an optional time-to-live.
    Memory {
        /// Entries older than this miss.
        ttl: Option<Duration>,
    },
    /// [`RedisCache`] shared between processes.
    #[cfg(feature = "redis")]
    Redis {
        /// Connection URL with the `ttl_secs` parameter removed.
        url: String,
        /// Expiry handed to Redis with every write.
        ttl: Option<Duration>,
    },
    /// [`NoopCache`]: caching disabled.
    Disabled,
}

impl CacheBackend {
    /// Parse a backend URL.
    ///
    /// `memory://` selects the in-process LRU (`memory://?ttl_secs=N` adds a
    /// time-to-live) and `none://` disables caching. With the `redis`
    /// feature, `redis://` and `rediss://` select a Redis server; entries
    /// expire after [`DEFAULT_REDIS_TTL`] unless `ttl_secs` says otherwise.
    ///
    /// # Examples
    /// ```
    /// use std::time::Duration;
    /// use campusmap_core::cache::CacheBackend;
    ///
    /// assert_eq!(
    ///     CacheBackend::from_url("memory://?ttl_secs=60")?,
    ///     CacheBackend::Memory { ttl: Some(Duration::from_secs(60)) }
    /// );
    /// assert_eq!(CacheBackend::from_url("none://")?, CacheBackend::Disabled);
    /// # Ok::<(), campusmap_core::cache::CacheError>(())
    /// ```
    pub fn from_url(raw: &str) -> Result<Self, CacheError> {
        let url = Url::parse(raw.trim()).map_err(|err| CacheError::InvalidUrl {
            url: raw.to_owned(),
            message: err.to_string(),
        })?;
        match url.scheme() {
            "memory" => Ok(Self::Memory {
                ttl: ttl_param(&url, raw)?,
            }),
            #[cfg(feature = "redis")]
            "redis" | "rediss" => Ok(Self::Redis {
                ttl: Some(ttl_param(&url, raw)?.unwrap_or(DEFAULT_REDIS_TTL)),
                url: without_ttl(&url),
            }),
            "none" => Ok(Self::Disabled),
            other => Err(CacheError::UnsupportedBackend {
                scheme: other.to_owned(),
            }),
        }
    }

    /// Instantiate the backend. Remote backends connect lazily, so an
    /// unreachable server surfaces as failed lookups rather than here.
    pub fn build(self, capacity: NonZeroUsize) -> Result<Arc<dyn QueryCache>, CacheError> {
        match self {
            Self::Memory { ttl } => Ok(Arc::new(MemoryCache::new(capacity, ttl))),
            #[cfg(feature = "redis")]
            Self::Redis { url, ttl } => Ok(Arc::new(RedisCache::open(&url, ttl)?)),
            Self::Disabled => Ok(Arc::new(NoopCache)),
        }
    }
}

fn ttl_param(url: &Url, raw: &str) -> Result<Option<Duration>, CacheError> {
    let mut ttl = None;
    for (key, value) in url.query_pairs() {
        if key == "ttl_secs" {
            let seconds = value.parse::<u64>().map_err(|err| CacheError::InvalidUrl {
                url: raw.to_owned(),
                message: format!("ttl_secs: {err}"),
            })?;
            ttl = Some(Duration::from_secs(seconds));
        }
    }
    Ok(ttl)
}

#[cfg(feature = "redis")]
fn without_ttl(url: &Url) -> String {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "ttl_secs")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let mut cleaned = url.clone();
    if kept.is_empty() {
        cleaned.set_query(None);
    } else {
        cleaned.query_pairs_mut().clear().extend_pairs(kept);
    }
    cleaned.to_string()
}
