//! Processing Service Protocol
//!
//! The processing service exposes a single intake endpoint that accepts one
//! record per request.

use crate::normalizer::types::ProcessingRequest;
use serde::Serialize;

pub const ENDPOINT_PROCESS: &str = "/process";

/// Body of `POST /process`.
#[derive(Debug, Serialize)]
pub struct ProcessEnvelope<'a> {
    pub record: &'a ProcessingRequest,
}
