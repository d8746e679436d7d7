//! Record Normalizer Module
//!
//! Maps the heterogeneous stored-record shapes into one canonical
//! `ProcessingRequest`.
//!
//! ## Decoding Order
//! 1. **Identity**: `fileId` (+ `uploadedBy`) when present, else the flat `id`.
//! 2. **Location**: fields of the identity's generation, then the other one.
//!
//! A record with no id or no location is malformed and is dropped by the
//! caller; redelivering it would only reproduce the same data.
//!
//! ## Submodules
//! - **`schema`**: Field names, natural keys and the per-generation field readers.
//! - **`types`**: The canonical request, natural keys, and errors.

pub mod schema;
pub mod types;


use schema::{
    SchemaVariant, build_request, composite_location, legacy_location, natural_key,
};
use types::{NormalizeError, ProcessingRequest};

use crate::stream::types::RawRecord;

/// Normalizes a stored record into a processing request.
pub fn normalize(record: &RawRecord) -> Result<ProcessingRequest, NormalizeError> {
    normalize_with_variant(record).map(|(request, _)| request)
}

/// Like [`normalize`], also reporting which schema generation the identity came from.
///
/// The request's key always equals [`natural_key`] of the record.
pub fn normalize_with_variant(
    record: &RawRecord,
) -> Result<(ProcessingRequest, SchemaVariant), NormalizeError> {
    let Some(key) = natural_key(record) else {
        return Err(NormalizeError::MalformedRecord {
            reason: "no document id: composite schema missing [fileId]; legacy schema missing [id]"
                .to_string(),
        });
    };
    let variant = SchemaVariant::of(&key);

    let (primary, secondary) = match variant {
        SchemaVariant::Composite => (composite_location(record), legacy_location(record)),
        SchemaVariant::Legacy => (legacy_location(record), composite_location(record)),
    };

    let location = match (primary, secondary) {
        (Ok(location), _) | (Err(_), Ok(location)) => location,
        (Err(primary_missing), Err(secondary_missing)) => {
            let (composite_missing, legacy_missing) = match variant {
                SchemaVariant::Composite => (primary_missing, secondary_missing),
                SchemaVariant::Legacy => (secondary_missing, primary_missing),
            };
            return Err(NormalizeError::MalformedRecord {
                reason: format!(
                    "{}: no storage location: composite schema missing [{}]; legacy schema missing [{}]",
                    key,
                    composite_missing.join(", "),
                    legacy_missing.join(", ")
                ),
            });
        }
    };

    Ok((build_request(record, key, location), variant))
}
