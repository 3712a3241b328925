//! Domain data structures for providers, addresses, and pickup schedules.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Waste categories that can be collected.
///
/// The set is closed; each provider maps its own vocabulary onto a subset.
pub enum WasteType {
    /// Residual/gray bin.
    NonRecyclable,
    /// Organic waste.
    Organic,
    /// Paper and cardboard.
    Paper,
    /// Light packaging or plastics.
    Plastic,
    /// Christmas tree collection.
    Tree,
}

impl WasteType {
    /// Stable identifier used in cache payloads and calendar UIDs.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            WasteType::NonRecyclable => "non_recyclable",
            WasteType::Organic => "organic",
            WasteType::Paper => "paper",
            WasteType::Plastic => "plastic",
            WasteType::Tree => "tree",
        }
    }

    /// Human-friendly label used in calendar event titles.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            WasteType::NonRecyclable => "Non Recyclable",
            WasteType::Organic => "Organic",
            WasteType::Paper => "Paper",
            WasteType::Plastic => "Plastic",
            WasteType::Tree => "Tree",
        }
    }
}

impl fmt::Display for WasteType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.slug())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Built-in waste collection providers supported by the application.
pub enum Provider {
    /// Afvalstoffendienst 's-Hertogenbosch.
    Afvalstoffen,
    /// Cleanprofs cleaning service.
    Cleanprofs,
}

impl Provider {
    /// Stable identifier used in cache keys and route parameters.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Provider::Afvalstoffen => "afvalstoffen",
            Provider::Cleanprofs => "cleanprofs",
        }
    }

    /// Prefix used in calendar event titles and identifiers.
    #[must_use]
    pub const fn label_prefix(self) -> &'static str {
        match self {
            Provider::Afvalstoffen => "Afval",
            Provider::Cleanprofs => "Cleanprofs",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.slug())
    }
}

#[derive(thiserror::Error, Debug)]
#[error("Unknown provider: {0}")]
/// A provider selector that does not match any built-in provider.
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "afvalstoffen" => Ok(Provider::Afvalstoffen),
            "cleanprofs" => Ok(Provider::Cleanprofs),
            _ => Err(UnknownProvider(value.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Address parameters identifying a household within a provider's service area.
pub struct AddressQuery {
    /// Postal code, e.g. "5211AB".
    pub postal_code: String,
    /// House number.
    pub number: String,
    /// Optional house number addition such as "A".
    pub addition: Option<String>,
}

impl AddressQuery {
    /// Construct a new address query.
    #[must_use]
    pub fn new<P: Into<String>, N: Into<String>, A: Into<String>>(
        postal_code: P,
        number: N,
        addition: Option<A>,
    ) -> Self {
        Self {
            postal_code: postal_code.into(),
            number: number.into(),
            addition: addition.map(Into::into),
        }
    }

    /// Check whether a required field is blank.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        self.postal_code.trim().is_empty() || self.number.trim().is_empty()
    }

    /// Addition normalized to an empty string when missing.
    #[must_use]
    pub fn addition_or_empty(&self) -> &str {
        self.addition.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Composite key addressing one provider/address combination in the cache.
pub struct CacheKey(String);

impl CacheKey {
    /// Build the canonical key for a provider and address.
    #[must_use]
    pub fn for_query(provider: Provider, query: &AddressQuery) -> Self {
        CacheKey(format!(
            "{provider}-{}-{}-{}",
            query.postal_code,
            query.number,
            query.addition_or_empty()
        ))
    }

    /// Key as a plain string slice, for backends that store strings.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Scheduled pickup for a specific day.
///
/// Ordering is by date first, waste type second, which keeps provider output
/// stable for equal dates.
pub struct PickupEvent {
    /// Date of the pickup.
    pub date: NaiveDate,
    /// Category of waste collected.
    pub waste_type: WasteType,
}
