//! Debounced trip writes.
//!
//! A new request replaces the pending record and restarts the timer. The
//! record leaves the pending slot only once it has been written, so a failed
//! deferred write can be retried through [`DebouncedWriter::flush`].

use std::sync::Arc;

use tokio::{
    sync::{Mutex, broadcast},
    task::JoinHandle,
    time::Duration,
};
use tracing::{debug, warn};

use crate::{
    core::repository::{RepoResult, TripRepository},
    trip::TripRecord,
    types::SeqNo,
};

use super::events::JournalEvent;

#[derive(Debug, Default)]
struct Pending {
    generation: u64,
    record: Option<TripRecord>,
}

pub(crate) struct DebouncedWriter {
    repo: TripRepository,
    delay: Duration,
    pending: Arc<Mutex<Pending>>,
    timer: Option<JoinHandle<()>>,
    events_tx: broadcast::Sender<JournalEvent>,
}

impl DebouncedWriter {
    pub(crate) fn new(
        repo: TripRepository,
        delay: Duration,
        events_tx: broadcast::Sender<JournalEvent>,
    ) -> Self {
        Self {
            repo,
            delay,
            pending: Arc::new(Mutex::new(Pending::default())),
            timer: None,
            events_tx,
        }
    }

    /// Replaces the pending record and restarts the timer.
    ///
    /// A pending record for a different trip is written out first; only
    /// repeated writes of the same trip collapse.
    pub(crate) async fn schedule(&mut self, record: TripRecord) -> RepoResult<()> {
        if self
            .pending_record()
            .await
            .is_some_and(|pending| pending.sequence_number != record.sequence_number)
        {
            self.flush().await?;
        }
        self.cancel_timer();
        let generation = {
            let mut pending = self.pending.lock().await;
            pending.generation += 1;
            pending.record = Some(record);
            pending.generation
        };
        self.arm(generation);
        Ok(())
    }

    /// Stops the timer but keeps the pending record.
    pub(crate) async fn pause(&mut self) {
        self.cancel_timer();
        self.pending.lock().await.generation += 1;
    }

    /// Restarts the timer for a record left pending by [`Self::pause`].
    pub(crate) async fn resume(&mut self) {
        let generation = {
            let mut pending = self.pending.lock().await;
            if pending.record.is_none() {
                return;
            }
            pending.generation += 1;
            pending.generation
        };
        self.arm(generation);
    }

    fn arm(&mut self, generation: u64) {
        let repo = self.repo.clone();
        let delay = self.delay;
        let pending = Arc::clone(&self.pending);
        let events_tx = self.events_tx.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut pending = pending.lock().await;
            if pending.generation != generation {
                return;
            }
            let Some(record) = pending.record.clone() else {
                return;
            };
            let seq = record.sequence_number;
            match repo.store_trip(&record).await {
                Ok(()) => {
                    pending.record = None;
                    debug!(seq, "debounced trip write done");
                    let _ = events_tx.send(JournalEvent::Persisted { seq });
                }
                Err(err) => {
                    warn!(seq, error = %err, "debounced trip write failed");
                    let _ = events_tx.send(JournalEvent::PersistFailed {
                        seq,
                        reason: err.to_string(),
                    });
                }
            }
        }));
    }

    /// Writes the pending record now, skipping the timer.
    pub(crate) async fn flush(&mut self) -> RepoResult<Option<SeqNo>> {
        self.cancel_timer();
        let mut pending = self.pending.lock().await;
        pending.generation += 1;
        let Some(record) = pending.record.clone() else {
            return Ok(None);
        };
        let seq = record.sequence_number;
        self.repo.store_trip(&record).await?;
        pending.record = None;
        let _ = self.events_tx.send(JournalEvent::Persisted { seq });
        Ok(Some(seq))
    }

    /// Drops the pending record without writing it.
    pub(crate) async fn discard(&mut self) -> Option<TripRecord> {
        self.cancel_timer();
        let mut pending = self.pending.lock().await;
        pending.generation += 1;
        pending.record.take()
    }

    /// Record waiting to be written.
    pub(crate) async fn pending_record(&self) -> Option<TripRecord> {
        self.pending.lock().await.record.clone()
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
