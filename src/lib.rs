//! Document Trigger Library
//!
//! This library crate defines the modules behind the `document_trigger` binary
//! (`main.rs`): a service that watches a document table for newly uploaded
//! records and hands each one, exactly once, to a downstream processing service.
//!
//! ## Architecture Modules
//! - **`stream`**: Change notifications as delivered by the table's stream, and the
//!   filter selecting the inserts that should start processing.
//! - **`normalizer`**: Decodes either generation of stored record into one
//!   canonical `ProcessingRequest`.
//! - **`status`**: The record table, the document lifecycle state machine, and the
//!   claim taken before dispatch so redelivered events never dispatch twice.
//! - **`dispatch`**: The HTTP client for the processing service.
//! - **`trigger`**: The per-batch pipeline, the change-feed consumer, and the HTTP
//!   entry points.
//! - **`config`**: Command-line and environment configuration.

pub mod config;
pub mod dispatch;
pub mod normalizer;
pub mod status;
pub mod stream;
pub mod trigger;
