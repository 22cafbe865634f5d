use std::time::Duration;

use tokio::{sync::broadcast, time::timeout};

use triplog::{
    config::JournalConfig,
    core::repository::TripRepository,
    kv::memory::MemoryKv,
    session::{TripSession, events::JournalEvent},
    trip::TripRecord,
};

fn debounced(ms: u64) -> JournalConfig {
    JournalConfig {
        commit_debounce_ms: ms,
        ..JournalConfig::default()
    }
}

async fn open(ms: u64) -> (TripSession, TripRepository, MemoryKv) {
    let kv = MemoryKv::new();
    let config = debounced(ms);
    let repo = TripRepository::with_backend(kv.clone(), &config);
    let session = TripSession::open(repo.clone(), &config).await.unwrap();
    (session, repo, kv)
}

async fn record_trip(session: &mut TripSession, start: f64, end: f64) -> TripRecord {
    assert!(session.start_trip(start).await.unwrap().is_accepted());
    assert!(session.end_trip(end).unwrap().is_accepted());
    session.confirm_and_commit().await.unwrap()
}

async fn wait_for(
    events: &mut broadcast::Receiver<JournalEvent>,
    wanted: impl Fn(&JournalEvent) -> bool,
) -> JournalEvent {
    timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event stream open");
            if wanted(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event before timeout")
}

#[tokio::test]
async fn trip_write_lands_after_the_delay() {
    let (mut session, repo, kv) = open(50).await;
    let mut events = session.subscribe();

    let committed = record_trip(&mut session, 10.0, 20.0).await;

    assert_eq!(kv.snapshot()["@latestTripNumber"], "1");
    assert_eq!(repo.get_trip(1).await.unwrap(), None);

    let persisted = wait_for(&mut events, |e| matches!(e, JournalEvent::Persisted { .. })).await;
    assert_eq!(persisted, JournalEvent::Persisted { seq: 1 });
    assert_eq!(repo.get_trip(1).await.unwrap(), Some(committed));
}

#[tokio::test]
async fn flush_writes_without_waiting() {
    let (mut session, repo, _kv) = open(60_000).await;
    let committed = record_trip(&mut session, 0.0, 7.0).await;

    assert_eq!(session.flush().await.unwrap(), Some(1));
    assert_eq!(repo.get_trip(1).await.unwrap(), Some(committed));
    assert_eq!(session.flush().await.unwrap(), None);
}

#[tokio::test]
async fn pending_trip_guards_the_next_start() {
    let (mut session, repo, _kv) = open(60_000).await;
    record_trip(&mut session, 100.0, 140.0).await;

    assert_eq!(repo.get_trip(1).await.unwrap(), None);
    assert_eq!(session.last_trip_end_odometer().await.unwrap(), Some(140.0));
    assert!(session.start_trip(120.0).await.unwrap().is_rejected());
    assert!(session.start_trip(140.0).await.unwrap().is_accepted());
}

#[tokio::test]
async fn back_to_back_commits_keep_every_trip() {
    let (mut session, repo, _kv) = open(60_000).await;
    let first = record_trip(&mut session, 0.0, 10.0).await;
    let second = record_trip(&mut session, 10.0, 25.0).await;

    // Scheduling the second trip pushed the first one out.
    assert_eq!(repo.get_trip(1).await.unwrap(), Some(first));
    assert_eq!(repo.get_trip(2).await.unwrap(), None);

    assert_eq!(session.flush().await.unwrap(), Some(2));
    assert_eq!(repo.get_trip(2).await.unwrap(), Some(second));
}

#[tokio::test]
async fn failed_deferred_write_stays_pending_until_flushed() {
    let (mut session, repo, kv) = open(30).await;
    let mut events = session.subscribe();
    let committed = record_trip(&mut session, 5.0, 9.0).await;
    kv.set_unavailable(true);

    let failed = wait_for(&mut events, |e| matches!(e, JournalEvent::PersistFailed { .. })).await;
    assert!(matches!(failed, JournalEvent::PersistFailed { seq: 1, .. }));

    assert!(session.flush().await.is_err());

    kv.set_unavailable(false);
    assert_eq!(repo.get_trip(1).await.unwrap(), None);
    assert_eq!(session.flush().await.unwrap(), Some(1));
    assert_eq!(repo.get_trip(1).await.unwrap(), Some(committed));
}

#[tokio::test]
async fn edits_and_removals_flush_first() {
    let (mut session, repo, _kv) = open(60_000).await;
    record_trip(&mut session, 0.0, 10.0).await;

    session.remove_trip(1).await.unwrap();

    assert_eq!(repo.get_trip(1).await.unwrap(), None);
    assert!(session.counter().is_empty());
    assert_eq!(session.flush().await.unwrap(), None);
}

#[tokio::test]
async fn purge_cancels_pending_write() {
    let (mut session, repo, kv) = open(40).await;
    record_trip(&mut session, 0.0, 3.0).await;

    session.purge().await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(repo.get_trip(1).await.unwrap(), None);
    assert_eq!(kv.snapshot().len(), 1);
    assert_eq!(kv.snapshot()["@latestTripNumber"], "-1");
}

#[tokio::test]
async fn failed_purge_keeps_pending_trip() {
    let (mut session, repo, kv) = open(200).await;
    let committed = record_trip(&mut session, 0.0, 12.0).await;

    kv.set_unavailable(true);
    assert!(session.purge().await.is_err());
    kv.set_unavailable(false);

    assert_eq!(session.counter().latest(), Some(1));
    assert_eq!(session.last_trip_end_odometer().await.unwrap(), Some(12.0));
    assert_eq!(session.flush().await.unwrap(), Some(1));
    assert_eq!(repo.get_trip(1).await.unwrap(), Some(committed));
    assert_eq!(kv.snapshot()["@latestTripNumber"], "1");
}

#[tokio::test]
async fn failed_purge_rearms_the_timer() {
    let (mut session, repo, kv) = open(50).await;
    let mut events = session.subscribe();
    let committed = record_trip(&mut session, 0.0, 4.0).await;

    kv.set_unavailable(true);
    assert!(session.purge().await.is_err());
    kv.set_unavailable(false);

    let persisted = wait_for(&mut events, |e| matches!(e, JournalEvent::Persisted { .. })).await;
    assert_eq!(persisted, JournalEvent::Persisted { seq: 1 });
    assert_eq!(repo.get_trip(1).await.unwrap(), Some(committed));
    assert_eq!(session.flush().await.unwrap(), None);
}

#[tokio::test]
async fn restore_drops_pending_trip_of_the_old_journal() {
    let (source, _source_repo, _source_kv) = open(0).await;
    let document = triplog::backup::export_namespace(source.repository())
        .await
        .unwrap();

    let (mut session, repo, _kv) = open(40).await;
    record_trip(&mut session, 0.0, 9.0).await;

    session.restore_backup(document).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(session.counter().is_empty());
    assert_eq!(repo.get_trip(1).await.unwrap(), None);
    assert_eq!(session.flush().await.unwrap(), None);
}
