//! Working state of the trip being recorded.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    trip::{Location, TripRecord},
    types::{Kilometers, SeqNo},
};

/// Lifecycle position of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No open trip.
    #[default]
    Idle,
    /// Start reading and time captured.
    Started,
    /// End reading and time captured, not yet committed.
    Ended,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Started => "started",
            Self::Ended => "ended",
        })
    }
}

/// Data captured so far for the open trip.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TripDraft {
    /// Identifier assigned on start.
    pub trip_id: Option<Uuid>,
    /// Opening reading.
    pub odometer_start: Option<Kilometers>,
    /// Closing reading.
    pub odometer_end: Option<Kilometers>,
    /// Start time.
    pub time_started: Option<DateTime<Utc>>,
    /// End time.
    pub time_ended: Option<DateTime<Utc>>,
    /// Where the trip started.
    pub location_start: Option<Location>,
    /// Where the trip ended.
    pub location_end: Option<Location>,
    /// Start evidence image.
    pub start_image_id: Option<String>,
    /// End evidence image.
    pub end_image_id: Option<String>,
}

impl TripDraft {
    /// `odometer_end - odometer_start`, once both are known.
    pub fn distance(&self) -> Option<Kilometers> {
        Some(self.odometer_end? - self.odometer_start?)
    }

    /// Materializes the record written on commit. `None` until the trip has ended.
    pub(crate) fn to_record(&self, seq: SeqNo, now: DateTime<Utc>) -> Option<TripRecord> {
        let mut record = TripRecord {
            trip_id: self.trip_id?,
            sequence_number: seq,
            trip_start_image_id: self.start_image_id.clone(),
            trip_end_image_id: self.end_image_id.clone(),
            time_started: self.time_started?,
            time_ended: self.time_ended?,
            odometer_start: self.odometer_start?,
            odometer_end: self.odometer_end?,
            location_start: self.location_start.as_ref().and_then(Location::describe),
            location_end: self.location_end.as_ref().and_then(Location::describe),
            distance_in_km: 0.0,
            last_modified: now,
        };
        record.touch(now);
        Some(record)
    }
}
