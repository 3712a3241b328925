//! Cache layer storing completed lookup outcomes between provider calls.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;

use crate::model::{CacheKey, PickupEvent};

/// Marker stored for addresses a provider affirmatively does not know.
///
/// Success payloads are JSON arrays, so the marker can never collide with one.
pub const NOT_FOUND_MARKER: &str = "__not_found__";

/// How long a successful lookup stays valid in the Redis backend.
pub const POSITIVE_TTL: Duration = Duration::from_secs(3600);
/// How long a confirmed-absent lookup stays valid in the Redis backend.
/// Shorter than [`POSITIVE_TTL`] so vanished addresses get re-checked sooner.
pub const NEGATIVE_TTL: Duration = Duration::from_secs(300);
/// Freshness window of the in-process backend.
pub const MEMORY_FRESHNESS: Duration = Duration::from_secs(5 * 60 * 60);

#[derive(thiserror::Error, Debug)]
/// Errors raised by cache backends.
pub enum CacheError {
    /// The backend could not be reached or rejected the command.
    #[error("Cache backend error: {0}")]
    Backend(#[from] redis::RedisError),
    /// A stored payload could not be decoded.
    #[error("Corrupt cache payload: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of a cache lookup.
pub enum CacheLookup {
    /// A previously stored successful lookup.
    Success(Vec<PickupEvent>),
    /// The address was recently confirmed absent.
    Absent,
    /// Nothing usable is stored for this key.
    Miss,
}

#[async_trait]
/// Storage for completed lookup outcomes.
///
/// Entries are replaced wholesale or left to expire, never partially updated.
pub trait ScheduleCache: Send + Sync {
    /// Look up the stored outcome for a key.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] when the backend fails. Callers may treat a
    /// failed read as a [`CacheLookup::Miss`].
    async fn get(&self, key: &CacheKey) -> Result<CacheLookup, CacheError>;

    /// Store a successful lookup, replacing whatever the key held before.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] when the backend rejects the write.
    async fn put_success(&self, key: &CacheKey, events: &[PickupEvent]) -> Result<(), CacheError>;

    /// Store a confirmed-absent lookup, replacing whatever the key held before.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] when the backend rejects the write.
    async fn put_absent(&self, key: &CacheKey) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
enum StoredOutcome {
    Success(Vec<PickupEvent>),
    Absent,
}

type Entries = HashMap<CacheKey, (Instant, StoredOutcome)>;

/// In-process cache holding outcomes for a fixed freshness window.
///
/// Stale entries read as a miss but are not evicted; the map only grows over
/// the lifetime of the process and is lost on restart.
pub struct MemoryCache {
    entries: Mutex<Entries>,
    freshness: Duration,
}

impl MemoryCache {
    /// Create a cache with the default freshness window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_freshness(MEMORY_FRESHNESS)
    }

    /// Create a cache with a custom freshness window.
    #[must_use]
    pub fn with_freshness(freshness: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            freshness,
        }
    }

    /// Number of entries currently held, stale ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check whether the cache holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScheduleCache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<CacheLookup, CacheError> {
        let entries = self.lock();
        let lookup = match entries.get(key) {
            Some((stored_at, outcome)) if stored_at.elapsed() < self.freshness => match outcome {
                StoredOutcome::Success(events) => CacheLookup::Success(events.clone()),
                StoredOutcome::Absent => CacheLookup::Absent,
            },
            _ => CacheLookup::Miss,
        };
        Ok(lookup)
    }

    async fn put_success(&self, key: &CacheKey, events: &[PickupEvent]) -> Result<(), CacheError> {
        self.lock().insert(
            key.clone(),
            (Instant::now(), StoredOutcome::Success(events.to_vec())),
        );
        Ok(())
    }

    async fn put_absent(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.lock()
            .insert(key.clone(), (Instant::now(), StoredOutcome::Absent));
        Ok(())
    }
}

/// Redis-backed cache shared between processes.
///
/// Successful lookups are stored as JSON with [`POSITIVE_TTL`]; confirmed-absent
/// lookups as [`NOT_FOUND_MARKER`] with the shorter [`NEGATIVE_TTL`].
pub struct RedisCache {
    client: redis::Client,
    positive_ttl: Duration,
    negative_ttl: Duration,
}

impl RedisCache {
    /// Configure a cache for the given Redis URL, e.g. `redis://localhost/`.
    ///
    /// Connections are established lazily per command.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] when the URL is not a valid Redis endpoint.
    pub fn new(url: &str) -> Result<Self, CacheError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            positive_ttl: POSITIVE_TTL,
            negative_ttl: NEGATIVE_TTL,
        })
    }

    /// Override the default expirations.
    #[must_use]
    pub fn with_ttls(mut self, positive: Duration, negative: Duration) -> Self {
        self.positive_ttl = positive;
        self.negative_ttl = negative;
        self
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl ScheduleCache for RedisCache {
    async fn get(&self, key: &CacheKey) -> Result<CacheLookup, CacheError> {
        let mut conn = self.connection().await?;
        let stored: Option<String> = conn.get(key.as_str()).await?;
        decode_stored(stored)
    }

    async fn put_success(&self, key: &CacheKey, events: &[PickupEvent]) -> Result<(), CacheError> {
        let payload = serde_json::to_string(events)?;
        let mut conn = self.connection().await?;
        let written: redis::RedisResult<()> = conn
            .set_ex(key.as_str(), payload, self.positive_ttl.as_secs())
            .await;
        written?;
        Ok(())
    }

    async fn put_absent(&self, key: &CacheKey) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let written: redis::RedisResult<()> = conn
            .set_ex(key.as_str(), NOT_FOUND_MARKER, self.negative_ttl.as_secs())
            .await;
        written?;
        Ok(())
    }
}

/// Classify a raw stored value into a lookup result.
fn decode_stored(stored: Option<String>) -> Result<CacheLookup, CacheError> {
    match stored {
        None => Ok(CacheLookup::Miss),
        Some(value) if value == NOT_FOUND_MARKER => Ok(CacheLookup::Absent),
        Some(value) => {
            let events: Vec<PickupEvent> = serde_json::from_str(&value)?;
            Ok(CacheLookup::Success(events))
        }
    }
}
