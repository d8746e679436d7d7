//! Document Status Module
//!
//! Owns the record lifecycle and every read or write of the document table made
//! by this service.
//!
//! ## Lifecycle
//! `pending -> processing -> {completed, failed}`. Records never return to
//! `pending`. The table enforces the state machine on every write. This service
//! only writes around a dispatch: the `pending -> processing` claim, then a step
//! update once accepted, a release after a retryable failure, or
//! `processing -> failed` after a rejection.
//!
//! ## Submodules
//! - **`types`**: Status enum, transition rules, status projection, update DTOs.
//! - **`table`**: The `RecordTable` trait and `StoreError`.
//! - **`memory`**: In-process table with a change feed.
//! - **`remote`**: HTTP client for a table hosted by a peer.
//! - **`accessor`**: Status lookups across both key schemas, claims, releases and rejections.
//! - **`protocol`** / **`handlers`**: HTTP surface for status queries and table access.

pub mod accessor;
pub mod handlers;
pub mod memory;
pub mod protocol;
pub mod remote;
pub mod table;
pub mod types;

#[cfg(test)]
mod tests;
