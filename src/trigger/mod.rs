//! Trigger Module
//!
//! Turns change events into processing requests for the processing service.
//!
//! ## Submodules
//! - **`pipeline`**: Filter, normalize, claim and dispatch for one batch.
//! - **`consumer`**: Batches the local change feed and runs the pipeline per batch.
//! - **`handlers`**: HTTP entry points (pushed batches, record intake, health).
//! - **`types`**: Per-record outcomes and the batch report.

pub mod consumer;
pub mod handlers;
pub mod pipeline;
pub mod types;
