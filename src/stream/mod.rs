//! Change Stream Module
//!
//! Models the change-data-capture stream emitted by the document table and decides
//! which notifications are worth acting on.
//!
//! ## Submodules
//! - **`types`**: Typed attribute values, stored records, and change notifications.
//! - **`filter`**: The pending-insert predicate applied to every batch.

pub mod filter;
pub mod types;
