//! Whole-journal invariant checks.
//!
//! Used after a backup import, which writes raw pairs without validating them.

use std::fmt;

use tracing::warn;

use crate::{trip::TripRecord, types::SeqNo};

use super::repository::{RepoResult, TripRepository};

/// Distances closer than this are considered equal.
const DISTANCE_EPSILON: f64 = 1e-6;

/// One broken invariant.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// No trip stored at `seq` although the counter is past it.
    Gap {
        /// Missing position.
        seq: SeqNo,
    },
    /// A trip is stored above the counter.
    BeyondCounter {
        /// Position of the stray trip.
        seq: SeqNo,
    },
    /// The record's `sequenceNumber` disagrees with its key.
    MisplacedRecord {
        /// Key position.
        key_seq: SeqNo,
        /// Value found in the record.
        record_seq: SeqNo,
    },
    /// `odometerEnd < odometerStart` within one trip.
    OdometerInverted {
        /// Trip position.
        seq: SeqNo,
    },
    /// `timeEnded < timeStarted` within one trip.
    TimeInverted {
        /// Trip position.
        seq: SeqNo,
    },
    /// Stored distance does not match the odometer readings.
    DistanceMismatch {
        /// Trip position.
        seq: SeqNo,
    },
    /// A trip starts below the previous trip's closing odometer.
    OdometerRegression {
        /// Earlier trip.
        prev: SeqNo,
        /// Later trip.
        next: SeqNo,
    },
    /// A trip starts before the previous trip ended.
    TimeRegression {
        /// Earlier trip.
        prev: SeqNo,
        /// Later trip.
        next: SeqNo,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gap { seq } => write!(f, "trip #{seq} is missing"),
            Self::BeyondCounter { seq } => write!(f, "trip #{seq} lies beyond the latest counter"),
            Self::MisplacedRecord {
                key_seq,
                record_seq,
            } => write!(f, "key trip#{key_seq} holds sequence number {record_seq}"),
            Self::OdometerInverted { seq } => write!(f, "trip #{seq} ends below its start odometer"),
            Self::TimeInverted { seq } => write!(f, "trip #{seq} ends before it starts"),
            Self::DistanceMismatch { seq } => write!(f, "trip #{seq} has a stale distance"),
            Self::OdometerRegression { prev, next } => {
                write!(f, "trip #{next} starts below trip #{prev}'s closing odometer")
            }
            Self::TimeRegression { prev, next } => {
                write!(f, "trip #{next} starts before trip #{prev} ended")
            }
        }
    }
}

/// Checks one trip in isolation.
pub fn check_trip(trip: &TripRecord) -> Vec<Violation> {
    let seq = trip.sequence_number;
    let mut out = Vec::new();
    if trip.odometer_end < trip.odometer_start {
        out.push(Violation::OdometerInverted { seq });
    }
    if trip.time_ended < trip.time_started {
        out.push(Violation::TimeInverted { seq });
    }
    if (trip.distance_in_km - trip.computed_distance()).abs() > DISTANCE_EPSILON {
        out.push(Violation::DistanceMismatch { seq });
    }
    out
}

/// Checks that `next` may follow `prev`.
pub fn check_continuity(prev: &TripRecord, next: &TripRecord) -> Vec<Violation> {
    let mut out = Vec::new();
    if next.odometer_start < prev.odometer_end {
        out.push(Violation::OdometerRegression {
            prev: prev.sequence_number,
            next: next.sequence_number,
        });
    }
    if next.time_started < prev.time_ended {
        out.push(Violation::TimeRegression {
            prev: prev.sequence_number,
            next: next.sequence_number,
        });
    }
    out
}

/// Walks the whole journal and reports every broken invariant.
///
/// Gaps are reported but continuity is still checked across them.
pub async fn audit_journal(repo: &TripRepository) -> RepoResult<Vec<Violation>> {
    let latest = repo.latest_counter().await?.latest().unwrap_or(0);
    let mut violations = Vec::new();

    let mut stored_above: Vec<SeqNo> = repo
        .kv()
        .keys()
        .await?
        .into_iter()
        .filter_map(|key| key.trip_seq())
        .filter(|seq| *seq > latest)
        .collect();
    stored_above.sort_unstable();
    for seq in stored_above {
        violations.push(Violation::BeyondCounter { seq });
    }

    let seqs: Vec<SeqNo> = (1..=latest).collect();
    let mut prev: Option<TripRecord> = None;
    for (key, trip) in repo.get_trip_range(&seqs).await? {
        let key_seq = key.trip_seq().unwrap_or_default();
        let Some(trip) = trip else {
            violations.push(Violation::Gap { seq: key_seq });
            continue;
        };
        if trip.sequence_number != key_seq {
            violations.push(Violation::MisplacedRecord {
                key_seq,
                record_seq: trip.sequence_number,
            });
        }
        violations.extend(check_trip(&trip));
        if let Some(prev) = &prev {
            violations.extend(check_continuity(prev, &trip));
        }
        prev = Some(trip);
    }

    for violation in &violations {
        warn!(%violation, "journal invariant broken");
    }
    Ok(violations)
}
