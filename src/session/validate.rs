//! Continuity rules between a trip and its neighbours.

use chrono::{DateTime, Utc};

use crate::{trip::TripRecord, types::Kilometers};

/// Why a reading or edit was refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    /// Negative, infinite or NaN reading.
    #[error("odometer reading {value} is not a non-negative number")]
    InvalidReading {
        /// Offending reading.
        value: Kilometers,
    },
    /// Opening reading below the preceding trip's closing reading.
    #[error("odometer {value} is below the previous trip's closing reading {previous_end}")]
    BelowPreviousTrip {
        /// Offending reading.
        value: Kilometers,
        /// Closing reading of the preceding trip.
        previous_end: Kilometers,
    },
    /// Closing reading above the following trip's opening reading.
    #[error("odometer {value} is above the next trip's opening reading {next_start}")]
    AboveNextTrip {
        /// Offending reading.
        value: Kilometers,
        /// Opening reading of the following trip.
        next_start: Kilometers,
    },
    /// Closing reading below the same trip's opening reading.
    #[error("closing odometer {value} is below the opening reading {start}")]
    BelowTripStart {
        /// Offending reading.
        value: Kilometers,
        /// Opening reading of the trip.
        start: Kilometers,
    },
    /// Start time earlier than the preceding trip's end time.
    #[error("trip would start before the previous trip ended")]
    StartsBeforePreviousEnded,
    /// End time later than the following trip's start time.
    #[error("trip would end after the next trip started")]
    EndsAfterNextStarted,
    /// End time earlier than the start time.
    #[error("trip would end before it started")]
    EndsBeforeStart,
}

/// Outcome of a guarded transition.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Validation {
    /// The change was applied.
    Accepted,
    /// Nothing changed.
    Rejected(Rejection),
}

impl Validation {
    /// True when the change went through.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// True when nothing changed.
    pub fn is_rejected(&self) -> bool {
        !self.is_accepted()
    }

    /// The reason, when rejected.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Accepted => None,
            Self::Rejected(r) => Some(r),
        }
    }
}

impl From<Result<(), Rejection>> for Validation {
    fn from(value: Result<(), Rejection>) -> Self {
        match value {
            Ok(()) => Self::Accepted,
            Err(r) => Self::Rejected(r),
        }
    }
}

pub(crate) fn check_reading(value: Kilometers) -> Result<(), Rejection> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Rejection::InvalidReading { value })
    }
}

/// Rules for opening a trip after `previous`.
pub(crate) fn check_start(
    value: Kilometers,
    now: DateTime<Utc>,
    previous: Option<&TripRecord>,
) -> Result<(), Rejection> {
    check_reading(value)?;
    let Some(previous) = previous else {
        return Ok(());
    };
    if value < previous.odometer_end {
        return Err(Rejection::BelowPreviousTrip {
            value,
            previous_end: previous.odometer_end,
        });
    }
    if now < previous.time_ended {
        return Err(Rejection::StartsBeforePreviousEnded);
    }
    Ok(())
}

/// Rules for closing the open trip.
pub(crate) fn check_end(
    value: Kilometers,
    now: DateTime<Utc>,
    start: Kilometers,
    time_started: DateTime<Utc>,
) -> Result<(), Rejection> {
    check_reading(value)?;
    if value < start {
        return Err(Rejection::BelowTripStart { value, start });
    }
    if now < time_started {
        return Err(Rejection::EndsBeforeStart);
    }
    Ok(())
}

/// Rules for an edited trip sitting between `previous` and `next`.
pub(crate) fn check_edit(
    candidate: &TripRecord,
    previous: Option<&TripRecord>,
    next: Option<&TripRecord>,
) -> Result<(), Rejection> {
    check_reading(candidate.odometer_start)?;
    check_reading(candidate.odometer_end)?;
    if candidate.odometer_end < candidate.odometer_start {
        return Err(Rejection::BelowTripStart {
            value: candidate.odometer_end,
            start: candidate.odometer_start,
        });
    }
    if candidate.time_ended < candidate.time_started {
        return Err(Rejection::EndsBeforeStart);
    }
    if let Some(previous) = previous {
        if candidate.odometer_start < previous.odometer_end {
            return Err(Rejection::BelowPreviousTrip {
                value: candidate.odometer_start,
                previous_end: previous.odometer_end,
            });
        }
        if candidate.time_started < previous.time_ended {
            return Err(Rejection::StartsBeforePreviousEnded);
        }
    }
    if let Some(next) = next {
        if candidate.odometer_end > next.odometer_start {
            return Err(Rejection::AboveNextTrip {
                value: candidate.odometer_end,
                next_start: next.odometer_start,
            });
        }
        if candidate.time_ended > next.time_started {
            return Err(Rejection::EndsAfterNextStarted);
        }
    }
    Ok(())
}
