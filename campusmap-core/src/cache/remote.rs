//! Redis-backed cache shared between service instances.
//!
//! Entries are stored as JSON under `campusmap:<fingerprint>` together with
//! the generation that produced them. Expiry is left to Redis.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use redis::{Client, Commands, Connection, RedisError, RedisResult};
use serde::{Deserialize, Serialize};

use super::{CacheError, Fingerprint, QueryCache};
use crate::engine::{Generation, QueryOutput};

const KEY_PREFIX: &str = "campusmap:";
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Serialize)]
struct StoredRef<'a> {
    generation: Generation,
    payload: &'a QueryOutput,
}

#[derive(Deserialize)]
struct Stored {
    generation: Generation,
    payload: QueryOutput,
}

/// [`QueryCache`] on a Redis server.
///
/// One connection is opened on first use and reused; it is dropped after any
/// failure so the next call reconnects. Capacity is governed by the server's
/// own eviction policy.
pub struct RedisCache {
    client: Client,
    connection: Mutex<Option<Connection>>,
    ttl: Option<Duration>,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("server", &self.client.get_connection_info().addr)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Prepare a cache for the server at `url` without connecting yet.
    pub fn open(url: &str, ttl: Option<Duration>) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(|err| CacheError::InvalidUrl {
            url: url.to_owned(),
            message: err.to_string(),
        })?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            ttl,
        })
    }

    fn with_connection<T>(
        &self,
        run: impl FnOnce(&mut Connection) -> RedisResult<T>,
    ) -> Result<T, CacheError> {
        let mut slot = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            let connection = self
                .client
                .get_connection_with_timeout(CONNECT_TIMEOUT)
                .map_err(unavailable)?;
            *slot = Some(connection);
        }
        let Some(connection) = slot.as_mut() else {
            return Err(CacheError::Unavailable {
                message: "redis connection missing".to_owned(),
            });
        };
        let result = run(connection);
        if result.is_err() {
            *slot = None;
        }
        result.map_err(unavailable)
    }
}

fn unavailable(err: RedisError) -> CacheError {
    CacheError::Unavailable {
        message: format!("redis: {err}"),
    }
}

fn key(fingerprint: &Fingerprint) -> String {
    format!("{KEY_PREFIX}{fingerprint}")
}

impl QueryCache for RedisCache {
    fn get(
        &self,
        fingerprint: &Fingerprint,
        generation: Generation,
    ) -> Result<Option<Arc<QueryOutput>>, CacheError> {
        let key = key(fingerprint);
        let raw: Option<Vec<u8>> = self.with_connection(|connection| connection.get(&key))?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let stored: Stored = serde_json::from_slice(&raw).map_err(|err| CacheError::Unavailable {
            message: format!("undecodable entry {key}: {err}"),
        })?;
        if stored.generation == generation {
            return Ok(Some(Arc::new(stored.payload)));
        }
        self.with_connection(|connection| connection.del::<_, ()>(&key))?;
        Ok(None)
    }

    fn put(
        &self,
        fingerprint: Fingerprint,
        generation: Generation,
        payload: Arc<QueryOutput>,
    ) -> Result<(), CacheError> {
        let key = key(&fingerprint);
        let body = serde_json::to_vec(&StoredRef {
            generation,
            payload: &payload,
        })
        .map_err(|err| CacheError::Unavailable {
            message: format!("cannot encode {key}: {err}"),
        })?;
        match self.ttl {
            Some(ttl) => self.with_connection(|connection| {
                connection.set_ex::<_, _, ()>(&key, body, ttl.as_secs().max(1))
            }),
            None => self.with_connection(|connection| connection.set::<_, _, ()>(&key, body)),
        }
    }

    fn clear(&self) -> Result<usize, CacheError> {
        self.with_connection(|connection| {
            let keys: Vec<String> = connection
                .scan_match::<_, String>(format!("{KEY_PREFIX}*"))?
                .collect();
            if keys.is_empty() {
                return Ok(0);
            }
            connection.del::<_, usize>(&keys)
        })
    }
}
