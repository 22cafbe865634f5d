use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tokio::runtime::Runtime;

use triplog::{
    config::JournalConfig, core::repository::TripRepository, kv::memory::MemoryKv,
    session::TripSession,
};

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("runtime")
}

fn immediate() -> JournalConfig {
    JournalConfig {
        commit_debounce_ms: 0,
        ..JournalConfig::default()
    }
}

async fn journal_with(trips: u64) -> (TripSession, TripRepository) {
    let config = immediate();
    let repo = TripRepository::with_backend(MemoryKv::new(), &config);
    let mut session = TripSession::open(repo.clone(), &config)
        .await
        .expect("open");
    for i in 0..trips {
        let start = i as f64 * 12.0;
        let _ = session.start_trip(start).await.expect("start");
        let _ = session.end_trip(start + 12.0).expect("end");
        session.confirm_and_commit().await.expect("commit");
    }
    (session, repo)
}

fn bench_commits(c: &mut Criterion) {
    let rt = runtime();
    c.bench_function("session_commit_1k", |b| {
        b.iter(|| rt.block_on(journal_with(1_000)));
    });
}

fn bench_edits(c: &mut Criterion) {
    let rt = runtime();
    let (mut session, _repo) = rt.block_on(journal_with(1_000));
    c.bench_function("session_edit_location", |b| {
        let mut seq = 0u64;
        b.iter(|| {
            seq = seq % 1_000 + 1;
            let patch = triplog::trip::TripPatch {
                location_end: Some(format!("Stop {seq}")),
                ..Default::default()
            };
            let _ = rt
                .block_on(session.update_field(seq, &patch))
                .expect("edit");
        });
    });
}

fn bench_recent_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("recent_window");
    let rt = runtime();
    let (_session, repo) = rt.block_on(journal_with(5_000));

    for size in [5usize, 50usize, 500usize] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let _ = rt
                    .block_on(repo.list_recent_window(5_000, size))
                    .expect("window");
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_commits, bench_edits, bench_recent_window);
criterion_main!(benches);
