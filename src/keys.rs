//! Typed builder for every key the journal writes.

use std::fmt;

use crate::types::SeqNo;

const LATEST_TRIP_NUMBER: &str = "latestTripNumber";
const SAVED_PLACES: &str = "savedPlaces";
const TRIP_PREFIX: &str = "trip#";

/// Logical key inside the journal namespace, without the namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageKey {
    /// `latestTripNumber`
    LatestTripNumber,
    /// `trip#<n>`
    Trip(SeqNo),
    /// `savedPlaces`
    SavedPlaces,
    /// Any other key sharing the namespace.
    Other(String),
}

impl StorageKey {
    /// Parses a logical key. Unknown shapes land in [`StorageKey::Other`].
    pub fn parse(raw: &str) -> Self {
        match raw {
            LATEST_TRIP_NUMBER => Self::LatestTripNumber,
            SAVED_PLACES => Self::SavedPlaces,
            _ => match raw
                .strip_prefix(TRIP_PREFIX)
                .and_then(|n| n.parse::<SeqNo>().ok())
            {
                Some(seq) if seq > 0 => Self::Trip(seq),
                _ => Self::Other(raw.to_string()),
            },
        }
    }

    /// Sequence number for trip keys.
    pub fn trip_seq(&self) -> Option<SeqNo> {
        match self {
            Self::Trip(seq) => Some(*seq),
            _ => None,
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LatestTripNumber => f.write_str(LATEST_TRIP_NUMBER),
            Self::Trip(seq) => write!(f, "{TRIP_PREFIX}{seq}"),
            Self::SavedPlaces => f.write_str(SAVED_PLACES),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// Maps logical keys to physical keys and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    /// Namespace using `prefix` in front of every key.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The raw prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Physical key for `key`.
    pub fn physical(&self, key: &StorageKey) -> String {
        format!("{}{key}", self.prefix)
    }

    /// True when a physical key belongs to this namespace.
    pub fn contains(&self, physical: &str) -> bool {
        physical.starts_with(&self.prefix)
    }

    /// Logical key for a physical key, or `None` when it is foreign.
    pub fn logical(&self, physical: &str) -> Option<StorageKey> {
        physical.strip_prefix(&self.prefix).map(StorageKey::parse)
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_NAMESPACE)
    }
}
