//! Trip repository, history paging and journal audits.

/// Invariant checks over a stored journal.
pub mod audit;
/// Sequence-numbered trip storage.
pub mod repository;
/// Descending history windows.
pub mod window;
