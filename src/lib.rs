//! Vehicle trip journal: sequence-numbered trip records over a key-value store.
//!
//! # Examples
//!
//! Recording a trip with [`session::TripSession`] over an in-memory store:
//! ```
//! use triplog::{
//!     config::JournalConfig,
//!     core::repository::TripRepository,
//!     kv::memory::MemoryKv,
//!     session::TripSession,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = JournalConfig { commit_debounce_ms: 0, ..JournalConfig::default() };
//! let repo = TripRepository::with_backend(MemoryKv::new(), &config);
//! let mut session = TripSession::open(repo, &config).await.expect("open");
//!
//! assert!(session.start_trip(1_200.0).await.expect("start").is_accepted());
//! assert!(session.end_trip(1_242.5).expect("end").is_accepted());
//! let trip = session.confirm_and_commit().await.expect("commit");
//! assert_eq!(trip.sequence_number, 1);
//! assert_eq!(trip.distance_in_km, 42.5);
//!
//! // The next trip cannot start below the last closing reading.
//! assert!(session.start_trip(1_000.0).await.expect("start").is_rejected());
//! # }
//! ```
//!
//! Persisting to SQLite instead:
//! ```no_run
//! use triplog::{
//!     config::JournalConfig,
//!     core::repository::TripRepository,
//!     kv::sqlite::SqliteKv,
//!     session::TripSession,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = JournalConfig::from_env();
//! let kv = SqliteKv::open("triplog.db").expect("open sqlite");
//! let repo = TripRepository::with_backend(kv, &config);
//! let mut session = TripSession::open(repo, &config).await.expect("open");
//! let _ = session.start_trip(52_310.0).await.expect("start");
//! # }
//! ```
#![warn(missing_docs)]

/// Namespace export and import.
pub mod backup;
/// JSON object codec.
pub mod codec;
/// Journal configuration.
pub mod config;
/// Repository, paging and audits.
pub mod core;
/// Typed storage keys and namespacing.
pub mod keys;
/// Key-value substrate and adapter.
pub mod kv;
/// Open-trip state machine.
pub mod session;
/// Trip records and patches.
pub mod trip;
/// Shared primitive types.
pub mod types;
