//! Stored Record Schemas
//!
//! Two record generations coexist in the document table. Identity comes from
//! the natural key (composite `fileId` first, legacy `id` second). Storage fields
//! are read under the identity's own generation first and the other second, so
//! a row written half in each shape still decodes under the key it is stored at.
//!
//! | concept      | composite (current)          | legacy        |
//! |--------------|------------------------------|---------------|
//! | document id  | `fileId`                     | `id`          |
//! | owner        | `uploadedBy`                 | -             |
//! | bucket       | `s3Url` / `metadata.bucket`  | `bucket`      |
//! | object key   | `s3Key`                      | `key`         |
//! | content type | `fileType`                   | `file_type`   |
//! | size         | `fileSize`                   | -             |
//! | submitted at | `uploadDate`                 | `upload_date` |

use super::types::{ANONYMOUS_OWNER, ProcessingRequest, RecordKey, StorageLocation};
use crate::stream::types::RawRecord;

use chrono::{DateTime, NaiveDateTime, Utc};

pub const FIELD_FILE_ID: &str = "fileId";
pub const FIELD_UPLOADED_BY: &str = "uploadedBy";
pub const FIELD_S3_KEY: &str = "s3Key";
pub const FIELD_S3_URL: &str = "s3Url";
pub const FIELD_METADATA: &str = "metadata";
pub const FIELD_FILE_TYPE: &str = "fileType";
pub const FIELD_FILE_SIZE: &str = "fileSize";
pub const FIELD_UPLOAD_DATE: &str = "uploadDate";

pub const FIELD_ID: &str = "id";
pub const FIELD_BUCKET: &str = "bucket";
pub const FIELD_KEY: &str = "key";
pub const FIELD_LEGACY_FILE_TYPE: &str = "file_type";
pub const FIELD_LEGACY_UPLOAD_DATE: &str = "upload_date";

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Which record generation a request's identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVariant {
    Composite,
    Legacy,
}

/// Resolves the natural key of a row: composite first, then legacy.
///
/// This is also the identity a decoded request carries, so a claim always
/// targets the row the table stored.
pub fn natural_key(record: &RawRecord) -> Option<RecordKey> {
    if let Some(file_id) = record.get_str(FIELD_FILE_ID) {
        let owner = record
            .get_str(FIELD_UPLOADED_BY)
            .unwrap_or(ANONYMOUS_OWNER);
        return Some(RecordKey::composite(file_id, owner));
    }

    record.get_str(FIELD_ID).map(RecordKey::legacy)
}

impl SchemaVariant {
    pub fn of(key: &RecordKey) -> Self {
        match key {
            RecordKey::Composite { .. } => Self::Composite,
            RecordKey::Legacy { .. } => Self::Legacy,
        }
    }
}

/// Object location under the current-generation field names.
/// On failure returns the missing fields.
pub fn composite_location(record: &RawRecord) -> Result<StorageLocation, Vec<&'static str>> {
    let url_location = record.get_str(FIELD_S3_URL).and_then(parse_object_url);

    let bucket = url_location
        .as_ref()
        .map(|location| location.bucket.clone())
        .or_else(|| metadata_bucket(record))
        .or_else(|| record.get_str(FIELD_BUCKET).map(str::to_string));

    let key = record
        .get_str(FIELD_S3_KEY)
        .map(str::to_string)
        .or_else(|| url_location.map(|location| location.key));

    match (bucket, key) {
        (Some(bucket), Some(key)) => Ok(StorageLocation { bucket, key }),
        (bucket, key) => Err([(FIELD_S3_URL, bucket.is_none()), (FIELD_S3_KEY, key.is_none())]
            .into_iter()
            .filter(|(_, missing)| *missing)
            .map(|(field, _)| field)
            .collect()),
    }
}

/// Object location under the legacy field names.
/// On failure returns the missing fields.
pub fn legacy_location(record: &RawRecord) -> Result<StorageLocation, Vec<&'static str>> {
    match (record.get_str(FIELD_BUCKET), record.get_str(FIELD_KEY)) {
        (Some(bucket), Some(key)) => Ok(StorageLocation {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }),
        (bucket, key) => Err([(FIELD_BUCKET, bucket.is_none()), (FIELD_KEY, key.is_none())]
            .into_iter()
            .filter(|(_, missing)| *missing)
            .map(|(field, _)| field)
            .collect()),
    }
}

/// Builds the request for a row whose identity and location are resolved.
///
/// Optional fields prefer the current-generation name over the legacy one.
pub fn build_request(
    record: &RawRecord,
    key: RecordKey,
    storage_location: StorageLocation,
) -> ProcessingRequest {
    let declared_type = record
        .get_str(FIELD_FILE_TYPE)
        .or_else(|| record.get_str(FIELD_LEGACY_FILE_TYPE));
    let submitted_at = if record.get_str(FIELD_UPLOAD_DATE).is_some() {
        timestamp_field(record, FIELD_UPLOAD_DATE)
    } else {
        timestamp_field(record, FIELD_LEGACY_UPLOAD_DATE)
    };

    ProcessingRequest {
        document_id: key.document_id().to_string(),
        owner_id: key.owner_id().to_string(),
        content_type: content_type(declared_type, &storage_location.key),
        size_bytes: record.get_u64(FIELD_FILE_SIZE),
        submitted_at,
        storage_location,
        record_key: Some(key),
    }
}

/// Splits an object URL into bucket and key.
///
/// Accepts `s3://bucket/key`, virtual-hosted `https://bucket.s3.<region>.amazonaws.com/key`
/// and path-style `https://s3.<region>.amazonaws.com/bucket/key`.
pub fn parse_object_url(raw: &str) -> Option<StorageLocation> {
    let url = reqwest::Url::parse(raw).ok()?;
    let host = url.host_str()?;
    let path = url.path().trim_start_matches('/');

    let (bucket, key) = match url.scheme() {
        "s3" => (host.to_string(), path.to_string()),
        "http" | "https" => {
            if host.starts_with("s3.") || host.starts_with("s3-") {
                let (bucket, key) = path.split_once('/')?;
                (bucket.to_string(), key.to_string())
            } else if let Some((bucket, _)) = host.split_once(".s3") {
                (bucket.to_string(), path.to_string())
            } else {
                return None;
            }
        }
        _ => return None,
    };

    if bucket.is_empty() || key.is_empty() {
        return None;
    }

    Some(StorageLocation { bucket, key })
}

fn metadata_bucket(record: &RawRecord) -> Option<String> {
    record
        .get(FIELD_METADATA)?
        .as_map()?
        .get(FIELD_BUCKET)?
        .as_str()
        .filter(|bucket| !bucket.is_empty())
        .map(str::to_string)
}

fn content_type(declared: Option<&str>, key: &str) -> String {
    if let Some(declared) = declared {
        return declared.to_string();
    }

    key.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty() && !ext.contains('/'))
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string())
}

fn timestamp_field(record: &RawRecord, field: &str) -> Option<DateTime<Utc>> {
    let raw = record.get_str(field)?;
    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        tracing::warn!("Dropping unparseable {} value: {:?}", field, raw);
    }
    parsed
}

/// Parses RFC 3339, falling back to a naive ISO-8601 timestamp taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
