//! Journal event stream payloads.

use crate::types::SeqNo;

/// Events emitted by the trip session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEvent {
    /// A trip was opened.
    TripStarted,
    /// The open trip was closed and awaits confirmation.
    TripEnded,
    /// A trip received its sequence number.
    TripCommitted {
        /// Assigned sequence number.
        seq: SeqNo,
    },
    /// A committed trip was edited.
    TripUpdated {
        /// Edited trip.
        seq: SeqNo,
    },
    /// A committed trip was deleted.
    TripRemoved {
        /// Deleted trip.
        seq: SeqNo,
    },
    /// The trip record reached storage.
    Persisted {
        /// Written trip.
        seq: SeqNo,
    },
    /// A deferred trip write failed; the record stays pending.
    PersistFailed {
        /// Trip that could not be written.
        seq: SeqNo,
        /// Error text.
        reason: String,
    },
    /// The whole journal was wiped.
    Purged,
    /// The journal was replaced from a backup.
    Restored {
        /// Latest trip of the restored journal.
        latest: Option<SeqNo>,
    },
}
