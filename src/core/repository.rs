//! Sequence-numbered trip storage over the object codec.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    codec::{CodecError, ObjectCodec},
    config::JournalConfig,
    keys::{Namespace, StorageKey},
    kv::{KvAdapter, KvBackend},
    trip::{SavedPlace, TripPatch, TripRecord},
    types::{Kilometers, SeqNo, TripCounter},
};

use super::window::{WindowCursor, window_seqs};

/// Repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Codec or substrate failure.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// `latestTripNumber` holds something that is not an integer.
    #[error("latest trip counter is corrupt: {raw:?}")]
    CorruptCounter {
        /// Stored text.
        raw: String,
    },
}

impl From<crate::kv::KvError> for RepoError {
    fn from(value: crate::kv::KvError) -> Self {
        Self::Codec(CodecError::Storage(value))
    }
}

impl RepoError {
    /// True when an update targeted a missing trip.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Codec(CodecError::NotFound { .. }))
    }
}

/// Result alias for repository calls.
pub type RepoResult<T> = Result<T, RepoError>;

/// Merge document written by [`TripRepository::update_trip`].
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TripMerge<'a> {
    #[serde(flatten)]
    patch: &'a TripPatch,
    distance_in_km: Kilometers,
    last_modified: DateTime<Utc>,
}

/// CRUD over `trip#<n>` records plus the `latestTripNumber` counter.
#[derive(Clone)]
pub struct TripRepository {
    codec: ObjectCodec,
    window_size: usize,
}

impl TripRepository {
    /// Repository over an existing adapter.
    pub fn new(kv: KvAdapter, config: &JournalConfig) -> Self {
        Self {
            codec: ObjectCodec::new(kv),
            window_size: config.effective_window_size(),
        }
    }

    /// Wraps `backend` in a namespaced adapter built from `config`.
    pub fn with_backend(backend: impl KvBackend + 'static, config: &JournalConfig) -> Self {
        let kv = KvAdapter::new(backend, Namespace::new(config.namespace_prefix.clone()));
        Self::new(kv, config)
    }

    /// Underlying adapter.
    pub fn kv(&self) -> &KvAdapter {
        self.codec.kv()
    }

    /// Default history page size.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Writes `record` under its own sequence number.
    pub async fn store_trip(&self, record: &TripRecord) -> RepoResult<()> {
        debug!(seq = record.sequence_number, "storing trip");
        self.codec
            .store_object(&StorageKey::Trip(record.sequence_number), record)
            .await?;
        Ok(())
    }

    /// Writes several trips in one batch.
    pub async fn store_trips(&self, records: &[TripRecord]) -> RepoResult<()> {
        let items: Vec<(StorageKey, &TripRecord)> = records
            .iter()
            .map(|r| (StorageKey::Trip(r.sequence_number), r))
            .collect();
        self.codec.store_objects(&items).await?;
        Ok(())
    }

    /// Replaces a trip wholesale, refreshing its derived fields.
    pub async fn overwrite_trip(&self, mut record: TripRecord) -> RepoResult<TripRecord> {
        record.touch(Utc::now());
        self.store_trip(&record).await?;
        Ok(record)
    }

    /// `None` marks a journal boundary or a gap, not an error.
    pub async fn get_trip(&self, seq: SeqNo) -> RepoResult<Option<TripRecord>> {
        Ok(self.codec.get_object(&StorageKey::Trip(seq)).await?)
    }

    /// Batch fetch preserving input order.
    pub async fn get_trip_range(
        &self,
        seqs: &[SeqNo],
    ) -> RepoResult<Vec<(StorageKey, Option<TripRecord>)>> {
        let keys: Vec<StorageKey> = seqs.iter().copied().map(StorageKey::Trip).collect();
        Ok(self.codec.get_objects(&keys).await?)
    }

    /// Merges `patch` into trip `seq` and returns the stored result.
    ///
    /// An empty patch writes nothing. Otherwise distance and `lastModified`
    /// are refreshed alongside the patched fields.
    pub async fn update_trip(&self, seq: SeqNo, patch: &TripPatch) -> RepoResult<TripRecord> {
        let key = StorageKey::Trip(seq);
        let mut current: TripRecord = self
            .codec
            .get_object(&key)
            .await?
            .ok_or_else(|| CodecError::NotFound { key: key.clone() })?;
        if patch.is_empty() {
            return Ok(current);
        }

        patch.apply_to(&mut current);
        current.touch(Utc::now());
        let merge = TripMerge {
            patch,
            distance_in_km: current.distance_in_km,
            last_modified: current.last_modified,
        };
        debug!(seq, "merging trip patch");
        Ok(self.codec.update_object(&key, &merge).await?)
    }

    /// Removes one trip. Missing trips are ignored.
    pub async fn delete_trip(&self, seq: SeqNo) -> RepoResult<()> {
        debug!(seq, "deleting trip");
        self.kv().remove(&StorageKey::Trip(seq)).await?;
        Ok(())
    }

    /// Removes `record`'s trip by its sequence number.
    pub async fn delete_record(&self, record: &TripRecord) -> RepoResult<()> {
        self.delete_trip(record.sequence_number).await
    }

    /// Removes several trips in one batch.
    pub async fn delete_trips(&self, seqs: &[SeqNo]) -> RepoResult<()> {
        let keys: Vec<StorageKey> = seqs.iter().copied().map(StorageKey::Trip).collect();
        self.kv().remove_many(&keys).await?;
        Ok(())
    }

    /// Trips `from, from-1, …` down to `max(1, from - size + 1)`, newest first.
    /// Gaps are skipped.
    pub async fn list_recent_window(&self, from: SeqNo, size: usize) -> RepoResult<Vec<TripRecord>> {
        let seqs = window_seqs(from, size);
        if seqs.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .get_trip_range(&seqs)
            .await?
            .into_iter()
            .filter_map(|(_, trip)| trip)
            .collect())
    }

    /// Cursor positioned at the newest trip.
    pub async fn history_cursor(&self) -> RepoResult<WindowCursor> {
        let counter = self.latest_counter().await?;
        Ok(WindowCursor::starting_at(counter.latest(), self.window_size))
    }

    /// Next history page. Empty once the cursor is exhausted.
    pub async fn load_more(&self, cursor: &mut WindowCursor) -> RepoResult<Vec<TripRecord>> {
        let seqs = cursor.advance();
        if seqs.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .get_trip_range(&seqs)
            .await?
            .into_iter()
            .filter_map(|(_, trip)| trip)
            .collect())
    }

    /// Every trip from the counter down to 1.
    pub async fn all_trips(&self) -> RepoResult<Vec<TripRecord>> {
        let Some(latest) = self.latest_counter().await?.latest() else {
            return Ok(Vec::new());
        };
        let seqs: Vec<SeqNo> = (1..=latest).rev().collect();
        Ok(self
            .get_trip_range(&seqs)
            .await?
            .into_iter()
            .filter_map(|(_, trip)| trip)
            .collect())
    }

    /// Closest stored trip below `seq`, stepping over gaps.
    pub async fn previous_trip(&self, seq: SeqNo) -> RepoResult<Option<TripRecord>> {
        let mut from = seq.saturating_sub(1);
        while from > 0 {
            let page = self.list_recent_window(from, self.window_size).await?;
            if let Some(trip) = page.into_iter().next() {
                return Ok(Some(trip));
            }
            from = from.saturating_sub(self.window_size as SeqNo);
        }
        Ok(None)
    }

    /// Closest stored trip above `seq` and at most `upper`, stepping over gaps.
    pub async fn next_trip(&self, seq: SeqNo, upper: SeqNo) -> RepoResult<Option<TripRecord>> {
        let mut low = seq + 1;
        while low <= upper {
            let high = (low + self.window_size as SeqNo - 1).min(upper);
            let seqs: Vec<SeqNo> = (low..=high).collect();
            let found = self
                .get_trip_range(&seqs)
                .await?
                .into_iter()
                .find_map(|(_, trip)| trip);
            if found.is_some() {
                return Ok(found);
            }
            low = high + 1;
        }
        Ok(None)
    }

    /// Reads `latestTripNumber`. A missing key is the empty journal.
    pub async fn latest_counter(&self) -> RepoResult<TripCounter> {
        match self.kv().get(&StorageKey::LatestTripNumber).await? {
            Some(raw) => TripCounter::decode(&raw).ok_or(RepoError::CorruptCounter { raw }),
            None => Ok(TripCounter::EMPTY),
        }
    }

    /// Writes `latestTripNumber`.
    pub async fn store_counter(&self, counter: TripCounter) -> RepoResult<()> {
        debug!(counter = %counter.encode(), "storing latest trip counter");
        self.kv()
            .set(&StorageKey::LatestTripNumber, counter.encode())
            .await?;
        Ok(())
    }

    /// True when any key lives in the namespace.
    pub async fn has_contents(&self) -> RepoResult<bool> {
        Ok(!self.kv().keys().await?.is_empty())
    }

    /// Saved places, empty when none were stored.
    pub async fn saved_places(&self) -> RepoResult<Vec<SavedPlace>> {
        Ok(self
            .codec
            .get_object(&StorageKey::SavedPlaces)
            .await?
            .unwrap_or_default())
    }

    /// Replaces the saved places list.
    pub async fn store_saved_places(&self, places: &[SavedPlace]) -> RepoResult<()> {
        self.codec
            .store_object(&StorageKey::SavedPlaces, &places)
            .await?;
        Ok(())
    }

    /// Deletes every namespaced key and resets the counter to `-1`.
    pub async fn purge(&self) -> RepoResult<()> {
        info!(prefix = self.kv().namespace().prefix(), "purging journal");
        self.kv().clear().await?;
        self.store_counter(TripCounter::EMPTY).await
    }
}
