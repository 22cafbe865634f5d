use std::{
    collections::BTreeSet,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use proptest::prelude::*;

use triplog::{
    config::JournalConfig,
    core::{audit::{Violation, audit_journal}, repository::TripRepository},
    kv::memory::MemoryKv,
    session::{SessionError, TripSession, state::SessionPhase},
    trip::TripPatch,
    types::SeqNo,
};

#[derive(Debug, Clone)]
enum Action {
    Start { delta: i16 },
    End { delta: i16 },
    Commit,
    Discard,
    Remove { target: u8 },
    EditStart { target: u8, delta: i16 },
    EditEnd { target: u8, delta: i16 },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => (-30i16..120).prop_map(|delta| Action::Start { delta }),
        3 => (-20i16..150).prop_map(|delta| Action::End { delta }),
        3 => Just(Action::Commit),
        1 => Just(Action::Discard),
        1 => (0u8..16).prop_map(|target| Action::Remove { target }),
        2 => (0u8..16, -60i16..60).prop_map(|(target, delta)| Action::EditStart { target, delta }),
        2 => (0u8..16, -60i16..60).prop_map(|(target, delta)| Action::EditEnd { target, delta }),
    ]
}

fn ticking_clock() -> impl Fn() -> DateTime<Utc> + Send + Sync + 'static {
    let ticks = Arc::new(AtomicI64::new(0));
    let start = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid time");
    move || start + TimeDelta::minutes(ticks.fetch_add(1, Ordering::SeqCst))
}

async fn apply(
    session: &mut TripSession,
    repo: &TripRepository,
    live: &mut BTreeSet<SeqNo>,
    action: Action,
) -> Result<(), TestCaseError> {
    match action {
        Action::Start { delta } => {
            let base = session.last_trip_end_odometer().await.unwrap().unwrap_or(0.0);
            let value = base + f64::from(delta);
            let idle = session.phase() == SessionPhase::Idle;
            match session.start_trip(value).await {
                Ok(outcome) => {
                    prop_assert!(idle);
                    prop_assert_eq!(outcome.is_accepted(), value >= base);
                }
                Err(SessionError::InvalidState { .. }) => prop_assert!(!idle),
                Err(other) => return Err(TestCaseError::fail(other.to_string())),
            }
        }
        Action::End { delta } => {
            let started = session.phase() == SessionPhase::Started;
            let start = session.draft().odometer_start.unwrap_or(0.0);
            match session.end_trip(start + f64::from(delta)) {
                Ok(outcome) => {
                    prop_assert!(started);
                    prop_assert_eq!(outcome.is_accepted(), delta >= 0);
                }
                Err(SessionError::InvalidState { .. }) => prop_assert!(!started),
                Err(other) => return Err(TestCaseError::fail(other.to_string())),
            }
        }
        Action::Commit => {
            if session.phase() == SessionPhase::Ended {
                let committed = session.confirm_and_commit().await.unwrap();
                prop_assert!(live.insert(committed.sequence_number));
            } else {
                prop_assert!(session.confirm_and_commit().await.is_err());
            }
        }
        Action::Discard => session.discard(),
        Action::Remove { target } => {
            let Some(latest) = session.counter().latest() else {
                return Ok(());
            };
            let seq = SeqNo::from(target) % latest + 1;
            session.remove_trip(seq).await.unwrap();
            live.remove(&seq);
            if seq == latest {
                prop_assert_eq!(session.counter().latest(), latest.checked_sub(1).filter(|s| *s > 0));
            } else {
                prop_assert_eq!(session.counter().latest(), Some(latest));
            }
        }
        Action::EditStart { target, delta } | Action::EditEnd { target, delta } => {
            let Some(&seq) = live.iter().nth(usize::from(target) % live.len().max(1)) else {
                return Ok(());
            };
            let current = repo.get_trip(seq).await.unwrap().unwrap();
            let patch = if matches!(action, Action::EditStart { .. }) {
                TripPatch {
                    odometer_start: Some((current.odometer_start + f64::from(delta)).max(0.0)),
                    ..TripPatch::default()
                }
            } else {
                TripPatch {
                    odometer_end: Some((current.odometer_end + f64::from(delta)).max(0.0)),
                    ..TripPatch::default()
                }
            };
            let outcome = session.update_field(seq, &patch).await.unwrap();
            let stored = repo.get_trip(seq).await.unwrap().unwrap();
            if outcome.is_rejected() {
                prop_assert_eq!(stored, current);
            } else {
                prop_assert_eq!(stored.distance_in_km, stored.computed_distance());
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_sessions_only_ever_leave_gaps(actions in prop::collection::vec(action_strategy(), 1..80)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");

        runtime.block_on(async {
            let config = JournalConfig { commit_debounce_ms: 0, ..JournalConfig::default() };
            let repo = TripRepository::with_backend(MemoryKv::new(), &config);
            let mut session = TripSession::open(repo.clone(), &config)
                .await
                .unwrap()
                .with_clock(ticking_clock());
            let mut live = BTreeSet::<SeqNo>::new();

            for action in actions {
                apply(&mut session, &repo, &mut live, action).await?;

                let violations = audit_journal(&repo).await.unwrap();
                prop_assert!(
                    violations.iter().all(|v| matches!(v, Violation::Gap { .. })),
                    "unexpected violations: {:?}",
                    violations
                );

                let stored: Vec<SeqNo> = repo
                    .all_trips()
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|t| t.sequence_number)
                    .collect();
                let expected: Vec<SeqNo> = live.iter().rev().copied().collect();
                prop_assert_eq!(stored, expected);
                prop_assert_eq!(session.counter().latest(), repo.latest_counter().await.unwrap().latest());
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
