//! The single open trip and the guarded transitions around it.
//!
//! [`TripSession`] is the only writer of a journal. It validates readings when
//! they are captured, assigns sequence numbers on commit, keeps the
//! `latestTripNumber` counter in step, and re-checks neighbours on every edit.

/// Debounced trip writes.
mod debounce;
/// Event stream types emitted by the session.
pub mod events;
/// Phase and draft of the open trip.
pub mod state;
/// Continuity rules.
pub mod validate;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    backup::{BackupDocument, BackupError, RestoreReport, import_namespace},
    config::JournalConfig,
    core::{
        repository::{RepoError, TripRepository},
        window::WindowCursor,
    },
    trip::{Location, TripPatch, TripRecord},
    types::{Kilometers, SeqNo, TripCounter},
};

use self::{
    debounce::DebouncedWriter,
    events::JournalEvent,
    state::{SessionPhase, TripDraft},
    validate::Validation,
};

/// Session failures. Rejected readings are not errors, see [`Validation`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The transition is not allowed from the current phase.
    #[error("session is {found}, expected {expected}")]
    InvalidState {
        /// Phase the transition requires.
        expected: SessionPhase,
        /// Phase the session is in.
        found: SessionPhase,
    },
    /// An edit targeted a trip that is not stored.
    #[error("trip #{seq} does not exist")]
    NotFound {
        /// Requested trip.
        seq: SeqNo,
    },
    /// Storage failed; in-memory state is unchanged.
    #[error(transparent)]
    Repository(#[from] RepoError),
    /// A backup could not be restored.
    #[error(transparent)]
    Backup(#[from] BackupError),
}

/// Result alias for session calls.
pub type SessionResult<T> = Result<T, SessionError>;

/// Source of "now".
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The journal's single writer.
pub struct TripSession {
    repo: TripRepository,
    phase: SessionPhase,
    draft: TripDraft,
    counter: TripCounter,
    writer: Option<DebouncedWriter>,
    events_tx: broadcast::Sender<JournalEvent>,
    clock: Clock,
}

impl TripSession {
    /// Opens a session over `repo`, loading the latest-trip counter.
    pub async fn open(repo: TripRepository, config: &JournalConfig) -> SessionResult<Self> {
        let counter = repo.latest_counter().await?;
        let (events_tx, _) = broadcast::channel(256);
        let writer = (config.commit_debounce_ms > 0).then(|| {
            DebouncedWriter::new(repo.clone(), config.commit_debounce(), events_tx.clone())
        });
        info!(latest = %counter.encode(), "trip session opened");
        Ok(Self {
            repo,
            phase: SessionPhase::Idle,
            draft: TripDraft::default(),
            counter,
            writer,
            events_tx,
            clock: Arc::new(Utc::now),
        })
    }

    /// Replaces the wall clock.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Event stream receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<JournalEvent> {
        self.events_tx.subscribe()
    }

    /// Underlying repository.
    pub fn repository(&self) -> &TripRepository {
        &self.repo
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Data captured for the open trip.
    pub fn draft(&self) -> &TripDraft {
        &self.draft
    }

    /// In-memory latest-trip counter.
    pub fn counter(&self) -> TripCounter {
        self.counter
    }

    /// True between an accepted start and the matching end.
    pub fn trip_in_progress(&self) -> bool {
        self.phase == SessionPhase::Started
    }

    /// Start location while idle, end location afterwards.
    pub fn set_location(&mut self, location: Location) {
        match self.phase {
            SessionPhase::Idle => self.draft.location_start = Some(location),
            SessionPhase::Started | SessionPhase::Ended => {
                self.draft.location_end = Some(location)
            }
        }
    }

    /// Attaches the start evidence image.
    pub fn set_start_image_id(&mut self, image_id: impl Into<String>) {
        self.draft.start_image_id = Some(image_id.into());
    }

    /// Attaches the end evidence image.
    pub fn set_end_image_id(&mut self, image_id: impl Into<String>) {
        self.draft.end_image_id = Some(image_id.into());
    }

    /// Closing odometer of the newest trip, pending writes included.
    pub async fn last_trip_end_odometer(&self) -> SessionResult<Option<Kilometers>> {
        Ok(self.last_trip().await?.map(|trip| trip.odometer_end))
    }

    /// Opens a trip at `odometer_start`.
    ///
    /// Rejected when the reading is below the newest trip's closing reading or
    /// when that trip ended in the future. Always accepted on an empty journal.
    pub async fn start_trip(&mut self, odometer_start: Kilometers) -> SessionResult<Validation> {
        self.expect_phase(SessionPhase::Idle)?;
        let now = (self.clock)();
        let previous = self.last_trip().await?;
        if let Err(rejection) = validate::check_start(odometer_start, now, previous.as_ref()) {
            warn!(odometer_start, %rejection, "trip start rejected");
            return Ok(Validation::Rejected(rejection));
        }

        self.draft.trip_id = Some(Uuid::new_v4());
        self.draft.odometer_start = Some(odometer_start);
        self.draft.time_started = Some(now);
        self.phase = SessionPhase::Started;
        info!(odometer_start, "trip started");
        let _ = self.events_tx.send(JournalEvent::TripStarted);
        Ok(Validation::Accepted)
    }

    /// Closes the open trip at `odometer_end`.
    pub fn end_trip(&mut self, odometer_end: Kilometers) -> SessionResult<Validation> {
        self.expect_phase(SessionPhase::Started)?;
        let now = (self.clock)();
        let (Some(start), Some(time_started)) =
            (self.draft.odometer_start, self.draft.time_started)
        else {
            return Err(SessionError::InvalidState {
                expected: SessionPhase::Started,
                found: SessionPhase::Idle,
            });
        };
        if let Err(rejection) = validate::check_end(odometer_end, now, start, time_started) {
            warn!(odometer_end, %rejection, "trip end rejected");
            return Ok(Validation::Rejected(rejection));
        }

        self.draft.odometer_end = Some(odometer_end);
        self.draft.time_ended = Some(now);
        self.phase = SessionPhase::Ended;
        info!(odometer_end, "trip ended");
        let _ = self.events_tx.send(JournalEvent::TripEnded);
        Ok(Validation::Accepted)
    }

    /// Assigns the next sequence number, persists the trip and the counter,
    /// and resets the session.
    ///
    /// The trip write is debounced when configured; the counter is written
    /// before returning. On failure the session keeps its draft so the commit
    /// can be retried.
    pub async fn confirm_and_commit(&mut self) -> SessionResult<TripRecord> {
        self.expect_phase(SessionPhase::Ended)?;
        let now = (self.clock)();
        let seq = self.counter.next();
        let record = self
            .draft
            .to_record(seq, now)
            .ok_or(SessionError::InvalidState {
                expected: SessionPhase::Ended,
                found: self.phase,
            })?;

        match self.writer.as_mut() {
            Some(writer) => writer.schedule(record.clone()).await?,
            None => self.repo.store_trip(&record).await?,
        }

        let advanced = TripCounter::at(seq);
        if let Err(err) = self.repo.store_counter(advanced).await {
            if let Some(writer) = self.writer.as_mut() {
                writer.discard().await;
            }
            warn!(seq, error = %err, "trip counter write failed, commit aborted");
            return Err(err.into());
        }

        self.counter = advanced;
        self.reset();
        info!(seq, distance_km = record.distance_in_km, "trip committed");
        let _ = self.events_tx.send(JournalEvent::TripCommitted { seq });
        if self.writer.is_none() {
            let _ = self.events_tx.send(JournalEvent::Persisted { seq });
        }
        Ok(record)
    }

    /// Writes any debounced trip immediately.
    pub async fn flush(&mut self) -> SessionResult<Option<SeqNo>> {
        match self.writer.as_mut() {
            Some(writer) => Ok(writer.flush().await?),
            None => Ok(None),
        }
    }

    /// Edits committed trip `seq`.
    ///
    /// The edited trip must stay consistent with itself and with the nearest
    /// stored trips on either side. Gaps left by deletions are stepped over.
    pub async fn update_field(&mut self, seq: SeqNo, patch: &TripPatch) -> SessionResult<Validation> {
        self.flush().await?;
        let Some(current) = self.repo.get_trip(seq).await? else {
            warn!(seq, "attempted to update a trip that does not exist");
            return Err(SessionError::NotFound { seq });
        };
        if patch.is_empty() {
            return Ok(Validation::Accepted);
        }

        let mut candidate = current;
        patch.apply_to(&mut candidate);
        let previous = self.repo.previous_trip(seq).await?;
        let next = match self.counter.latest() {
            Some(latest) if latest > seq => self.repo.next_trip(seq, latest).await?,
            _ => None,
        };
        if let Err(rejection) = validate::check_edit(&candidate, previous.as_ref(), next.as_ref()) {
            warn!(seq, %rejection, "trip edit rejected");
            return Ok(Validation::Rejected(rejection));
        }

        self.repo.update_trip(seq, patch).await.map_err(|err| {
            if err.is_not_found() {
                SessionError::NotFound { seq }
            } else {
                err.into()
            }
        })?;
        info!(seq, "trip updated");
        let _ = self.events_tx.send(JournalEvent::TripUpdated { seq });
        Ok(Validation::Accepted)
    }

    /// Deletes trip `seq`. Removing the newest trip steps the counter back by one;
    /// removing an older one leaves a gap.
    pub async fn remove_trip(&mut self, seq: SeqNo) -> SessionResult<()> {
        self.flush().await?;
        self.repo.delete_trip(seq).await?;
        if self.counter.latest() == Some(seq) {
            let stepped_back = self.counter.decremented();
            self.repo.store_counter(stepped_back).await?;
            self.counter = stepped_back;
        }
        info!(seq, latest = %self.counter.encode(), "trip removed");
        let _ = self.events_tx.send(JournalEvent::TripRemoved { seq });
        Ok(())
    }

    /// History cursor positioned at the newest trip, after flushing pending writes.
    pub async fn history(&mut self) -> SessionResult<WindowCursor> {
        self.flush().await?;
        Ok(WindowCursor::starting_at(
            self.counter.latest(),
            self.repo.window_size(),
        ))
    }

    /// Drops the open trip without committing it.
    pub fn discard(&mut self) {
        if self.phase != SessionPhase::Idle {
            info!(phase = %self.phase, "open trip discarded");
        }
        self.reset();
    }

    /// Wipes the journal and resets the session. Irreversible.
    ///
    /// A debounced trip survives a failed purge and is written later as usual.
    pub async fn purge(&mut self) -> SessionResult<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.pause().await;
        }
        if let Err(err) = self.repo.purge().await {
            if let Some(writer) = self.writer.as_mut() {
                writer.resume().await;
            }
            warn!(error = %err, "journal purge failed");
            return Err(err.into());
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.discard().await;
        }
        self.counter = TripCounter::EMPTY;
        self.reset();
        info!("journal purged");
        let _ = self.events_tx.send(JournalEvent::Purged);
        Ok(())
    }

    /// Re-reads the latest-trip counter after the namespace was rewritten
    /// underneath the session. Pending writes and the open trip are dropped.
    pub async fn reload(&mut self) -> SessionResult<TripCounter> {
        let counter = self.repo.latest_counter().await?;
        if let Some(writer) = self.writer.as_mut() {
            writer.discard().await;
        }
        self.counter = counter;
        self.reset();
        info!(latest = %counter.encode(), "trip session reloaded");
        Ok(counter)
    }

    /// Replaces the whole journal with `document` and reloads the session.
    ///
    /// On failure the session keeps its state, including any debounced trip.
    pub async fn restore_backup(&mut self, document: BackupDocument) -> SessionResult<RestoreReport> {
        if let Some(writer) = self.writer.as_mut() {
            writer.pause().await;
        }
        let report = match import_namespace(&self.repo, document).await {
            Ok(report) => report,
            Err(err) => {
                if let Some(writer) = self.writer.as_mut() {
                    writer.resume().await;
                }
                warn!(error = %err, "journal restore failed");
                return Err(err.into());
            }
        };
        let counter = self.reload().await?;
        let _ = self.events_tx.send(JournalEvent::Restored {
            latest: counter.latest(),
        });
        Ok(report)
    }

    async fn last_trip(&self) -> SessionResult<Option<TripRecord>> {
        let Some(latest) = self.counter.latest() else {
            return Ok(None);
        };
        if let Some(writer) = &self.writer {
            if let Some(pending) = writer.pending_record().await {
                if pending.sequence_number == latest {
                    return Ok(Some(pending));
                }
            }
        }
        Ok(self.repo.previous_trip(latest + 1).await?)
    }

    fn expect_phase(&self, expected: SessionPhase) -> SessionResult<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                expected,
                found: self.phase,
            })
        }
    }

    fn reset(&mut self) {
        self.phase = SessionPhase::Idle;
        self.draft = TripDraft::default();
    }
}
