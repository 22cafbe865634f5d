//! Trip records, sparse patches and the location descriptors fed in by the geocoder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Kilometers, SeqNo};

/// A committed trip as stored under `trip#<n>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRecord {
    /// Identifier generated when the trip started.
    pub trip_id: Uuid,
    /// Journal position.
    pub sequence_number: SeqNo,
    /// Evidence image taken at the start.
    pub trip_start_image_id: Option<String>,
    /// Evidence image taken at the end.
    pub trip_end_image_id: Option<String>,
    /// When the trip started.
    pub time_started: DateTime<Utc>,
    /// When the trip ended.
    pub time_ended: DateTime<Utc>,
    /// Odometer at the start.
    pub odometer_start: Kilometers,
    /// Odometer at the end.
    pub odometer_end: Kilometers,
    /// Where the trip started.
    pub location_start: Option<String>,
    /// Where the trip ended.
    pub location_end: Option<String>,
    /// `odometer_end - odometer_start`.
    pub distance_in_km: Kilometers,
    /// Last write time.
    pub last_modified: DateTime<Utc>,
}

impl TripRecord {
    /// Distance implied by the two odometer readings.
    pub fn computed_distance(&self) -> Kilometers {
        self.odometer_end - self.odometer_start
    }

    /// Recomputes the derived fields after a mutation.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.distance_in_km = self.computed_distance();
        self.last_modified = now;
    }
}

/// Sparse edit where each `Some` field overwrites the stored value.
///
/// Serializes only the fields that are set, so the JSON form is a shallow
/// merge document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPatch {
    /// Replacement start image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_start_image_id: Option<String>,
    /// Replacement end image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_end_image_id: Option<String>,
    /// Replacement start time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_started: Option<DateTime<Utc>>,
    /// Replacement end time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_ended: Option<DateTime<Utc>>,
    /// Replacement start odometer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odometer_start: Option<Kilometers>,
    /// Replacement end odometer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odometer_end: Option<Kilometers>,
    /// Replacement start location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_start: Option<String>,
    /// Replacement end location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_end: Option<String>,
}

impl TripPatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// True when either odometer endpoint changes.
    pub fn touches_odometer(&self) -> bool {
        self.odometer_start.is_some() || self.odometer_end.is_some()
    }

    /// Applies this patch in place to `rec`. Derived fields are left alone.
    pub fn apply_to(&self, rec: &mut TripRecord) {
        if let Some(v) = &self.trip_start_image_id {
            rec.trip_start_image_id = Some(v.clone());
        }
        if let Some(v) = &self.trip_end_image_id {
            rec.trip_end_image_id = Some(v.clone());
        }
        if let Some(v) = self.time_started {
            rec.time_started = v;
        }
        if let Some(v) = self.time_ended {
            rec.time_ended = v;
        }
        if let Some(v) = self.odometer_start {
            rec.odometer_start = v;
        }
        if let Some(v) = self.odometer_end {
            rec.odometer_end = v;
        }
        if let Some(v) = &self.location_start {
            rec.location_start = Some(v.clone());
        }
        if let Some(v) = &self.location_end {
            rec.location_end = Some(v.clone());
        }
    }
}

/// Named address the user picks from when editing a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPlace {
    /// Display name.
    pub name: String,
    /// Address text.
    pub address: String,
}

/// Location as handed over by the geocoding collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    /// Already human readable.
    Text(String),
    /// Reverse-geocoded position.
    Resolved(ResolvedLocation),
}

/// Reverse-geocoding result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolvedLocation {
    /// Candidate addresses, best match first.
    #[serde(default)]
    pub address: Vec<PostalAddress>,
    /// Raw position, if the geocoder passed it along.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<Coordinates>,
}

/// One reverse-geocoded address.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostalAddress {
    /// Street line.
    #[serde(default)]
    pub street: Option<String>,
    /// City.
    #[serde(default)]
    pub city: Option<String>,
}

/// Latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Degrees north.
    pub latitude: f64,
    /// Degrees east.
    pub longitude: f64,
}

impl Location {
    /// Human-readable form stored on the trip, `None` when nothing usable was resolved.
    pub fn describe(&self) -> Option<String> {
        match self {
            Self::Text(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Self::Resolved(resolved) => {
                let first = resolved.address.first();
                match first.map(|a| (a.street.as_deref(), a.city.as_deref())) {
                    Some((Some(street), Some(city))) => Some(format!("{street}, {city}")),
                    Some((Some(one), None) | (None, Some(one))) => Some(one.to_string()),
                    _ => resolved
                        .coords
                        .map(|c| format!("{:.5}, {:.5}", c.latitude, c.longitude)),
                }
            }
        }
    }
}
