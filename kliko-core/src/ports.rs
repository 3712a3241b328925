//! Traits describing provider capabilities and shared helper types.

use async_trait::async_trait;
use reqwest::Error as ReqwestError;

use crate::model::{AddressQuery, PickupEvent, Provider};

#[derive(thiserror::Error, Debug)]
/// Transient errors that can occur while talking to provider backends.
///
/// "The provider does not know this address" is not an error; ports report it
/// as [`ScheduleOutcome::Absent`] so the caller can cache the answer.
pub enum PortError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Internal provider error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of a completed provider lookup.
pub enum ScheduleOutcome {
    /// Pickup dates for the address, sorted ascending. May be empty when the
    /// provider knows the address but lists no upcoming pickups.
    Found(Vec<PickupEvent>),
    /// The provider affirmatively has no record for the address.
    Absent,
}

#[async_trait]
/// Trait for provider-specific pickup schedule backends.
pub trait SchedulePort: Send + Sync {
    /// Provider handled by this port.
    fn provider(&self) -> Provider;

    /// Fetch pickup events for the given address.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the provider exchange fails in a way that
    /// may succeed on retry. Unknown addresses are a
    /// [`ScheduleOutcome::Absent`], not an error.
    async fn fetch(&self, query: &AddressQuery) -> Result<ScheduleOutcome, PortError>;
}
