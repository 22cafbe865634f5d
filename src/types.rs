//! Shared primitive aliases and the latest-trip counter.

use serde::{Deserialize, Serialize};

/// Position of a trip in the journal. Starts at 1.
pub type SeqNo = u64;
/// Odometer reading in kilometers.
pub type Kilometers = f64;

/// Persisted value of `latestTripNumber` when no trip was ever recorded.
pub const EMPTY_COUNTER: &str = "-1";

/// Scalar "latest sequence number" counter.
///
/// `None` is the empty journal, persisted as `"-1"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TripCounter(Option<SeqNo>);

impl TripCounter {
    /// Counter of a journal that never recorded a trip.
    pub const EMPTY: Self = Self(None);

    /// Counter pointing at `seq`. Zero collapses to the empty counter.
    pub fn at(seq: SeqNo) -> Self {
        if seq == 0 { Self::EMPTY } else { Self(Some(seq)) }
    }

    /// Latest assigned sequence number, if any.
    pub fn latest(&self) -> Option<SeqNo> {
        self.0
    }

    /// Returns true for the `-1` sentinel.
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Sequence number the next commit receives.
    pub fn next(&self) -> SeqNo {
        self.0.map_or(1, |seq| seq + 1)
    }

    /// Counter after removing the newest trip.
    pub fn decremented(&self) -> Self {
        match self.0 {
            Some(seq) => Self::at(seq - 1),
            None => Self::EMPTY,
        }
    }

    /// Wire form stored under `latestTripNumber`.
    pub fn encode(&self) -> String {
        match self.0 {
            Some(seq) => seq.to_string(),
            None => EMPTY_COUNTER.to_string(),
        }
    }

    /// Parses the wire form. Any negative number is read as the sentinel.
    pub fn decode(raw: &str) -> Option<Self> {
        let value: i64 = raw.trim().parse().ok()?;
        if value < 0 {
            return Some(Self::EMPTY);
        }
        Some(Self::at(value as SeqNo))
    }
}
