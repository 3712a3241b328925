//! High-level service facade combining the cache and both providers.

use std::sync::Arc;

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::cache::{CacheLookup, ScheduleCache};
use crate::calendar::{CalendarError, CalendarOptions, build_calendar};
use crate::model::{AddressQuery, CacheKey, PickupEvent, Provider};
use crate::ports::{PortError, SchedulePort, ScheduleOutcome};

#[derive(thiserror::Error, Debug)]
/// Errors surfaced to routing collaborators.
pub enum ServiceError {
    /// No pickup data exists for the requested address.
    #[error("No pickup data found for this address")]
    NotFound,
    /// The request parameters are unusable.
    #[error("Invalid request: {0}")]
    InvalidQuery(&'static str),
    /// Calendar options were rejected.
    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),
    /// The provider backend failed; the lookup may succeed on retry.
    #[error("Provider error: {0}")]
    Provider(#[from] PortError),
}

impl ServiceError {
    /// HTTP status equivalent, for routing collaborators mapping errors to
    /// responses.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::InvalidQuery(_) | ServiceError::Calendar(_) => StatusCode::BAD_REQUEST,
            ServiceError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Public entry point for resolving pickup schedules and calendar feeds.
///
/// Holds one cache backend and one port per provider, all injected at
/// construction.
pub struct KlikoService {
    cache: Arc<dyn ScheduleCache>,
    afvalstoffen: Arc<dyn SchedulePort>,
    cleanprofs: Arc<dyn SchedulePort>,
}

impl KlikoService {
    /// Create a new service bound to the provided cache and ports.
    #[must_use]
    pub fn new(
        cache: Arc<dyn ScheduleCache>,
        afvalstoffen: Arc<dyn SchedulePort>,
        cleanprofs: Arc<dyn SchedulePort>,
    ) -> Self {
        Self {
            cache,
            afvalstoffen,
            cleanprofs,
        }
    }

    /// Resolve the pickup schedule for an address, consulting the cache first.
    ///
    /// An empty list is a valid result: the provider knows the address but
    /// lists no upcoming pickups. Confirmed-absent addresses are cached with a
    /// short expiration so they are not re-fetched on every request; transient
    /// provider failures are never cached.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] when the provider has no record for the
    /// address, [`ServiceError::InvalidQuery`] for blank address fields, and
    /// [`ServiceError::Provider`] for transient backend failures.
    pub async fn get_schedule(
        &self,
        provider: Provider,
        query: &AddressQuery,
    ) -> Result<Vec<PickupEvent>, ServiceError> {
        if query.is_incomplete() {
            return Err(ServiceError::InvalidQuery(
                "postal code and house number are required",
            ));
        }

        let key = CacheKey::for_query(provider, query);

        match self.cached_lookup(&key).await {
            CacheLookup::Success(events) => {
                debug!(key = %key, "cache hit");
                return Ok(events);
            }
            CacheLookup::Absent => {
                debug!(key = %key, "cache hit (absent)");
                return Err(ServiceError::NotFound);
            }
            CacheLookup::Miss => {}
        }

        let port = self.port(provider);
        debug!(provider = %port.provider(), key = %key, "cache miss; fetching");

        match port.fetch(query).await? {
            ScheduleOutcome::Found(events) => {
                self.store_success(&key, &events).await;
                Ok(events)
            }
            ScheduleOutcome::Absent => {
                self.store_absent(&key).await;
                Err(ServiceError::NotFound)
            }
        }
    }

    /// Render the pickup schedule for an address as an `iCalendar` document.
    ///
    /// Reminder offsets beyond the first two are ignored.
    ///
    /// # Errors
    ///
    /// Everything [`Self::get_schedule`] raises, plus
    /// [`ServiceError::Calendar`] when the options are rejected.
    pub async fn get_calendar(
        &self,
        provider: Provider,
        query: &AddressQuery,
        options: &CalendarOptions,
    ) -> Result<String, ServiceError> {
        // Option validation comes first: a bad window must not touch the
        // cache or the provider.
        let options = options.normalized()?;
        let events = self.get_schedule(provider, query).await?;

        let calendar = build_calendar(
            &events,
            provider.label_prefix(),
            options.day_start,
            options.day_end,
            &options.alarm_offsets,
        )?;

        Ok(calendar.to_string())
    }

    fn port(&self, provider: Provider) -> &dyn SchedulePort {
        match provider {
            Provider::Afvalstoffen => self.afvalstoffen.as_ref(),
            Provider::Cleanprofs => self.cleanprofs.as_ref(),
        }
    }

    // A dead cache backend must not take lookups down: degrade reads to a miss
    // and drop failed writes, with a warning either way.
    async fn cached_lookup(&self, key: &CacheKey) -> CacheLookup {
        match self.cache.get(key).await {
            Ok(lookup) => lookup,
            Err(error) => {
                warn!(key = %key, error = %error, "cache read failed; treating as miss");
                CacheLookup::Miss
            }
        }
    }

    async fn store_success(&self, key: &CacheKey, events: &[PickupEvent]) {
        if let Err(error) = self.cache.put_success(key, events).await {
            warn!(key = %key, error = %error, "cache write failed");
        }
    }

    async fn store_absent(&self, key: &CacheKey) {
        if let Err(error) = self.cache.put_absent(key).await {
            warn!(key = %key, error = %error, "cache write failed");
        }
    }
}
