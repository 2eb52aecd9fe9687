//! Backend hazard confirmations.
//!
//! The remote semantic pass answers with a JSON object of the form
//! `{"hazards": ["car", "person"]}`.  The payload is parsed into the typed
//! [`BackendPayload`]; anything that does not match is reported as a
//! [`BackendParseError`] and, on the hot path, degraded to an empty
//! [`BackendConfirmation`] by [`confirmation_or_empty`].
//!
//! # Example
//!
//! ```rust
//! use wayguard_perception::backend::{confirmation_or_empty, parse_confirmation};
//!
//! let set = parse_confirmation(r#"{"hazards": ["car", "dog"]}"#).unwrap();
//! assert!(set.contains("car"));
//!
//! // Malformed payloads never fail the frame.
//! assert!(confirmation_or_empty(Some("not json")).is_empty());
//! ```

use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use wayguard_types::{BackendConfirmation, HazardError};

/// Wire shape of a backend confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BackendPayload {
    /// Lowercase labels of hazards the backend saw in the frame.
    pub hazards: Vec<String>,
}

/// Why a backend payload was rejected.
#[derive(Error, Debug)]
pub enum BackendParseError {
    /// The text is not JSON, or does not match [`BackendPayload`].
    #[error("malformed backend payload: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The payload parsed but an entry was blank.
    #[error("backend payload contains a blank hazard label at index {0}")]
    BlankLabel(usize),
}

impl From<BackendParseError> for HazardError {
    fn from(err: BackendParseError) -> Self {
        HazardError::BackendPayload(err.to_string())
    }
}

/// Parse raw response text into a confirmation set.
pub fn parse_confirmation(raw: &str) -> Result<BackendConfirmation, BackendParseError> {
    let payload: BackendPayload = serde_json::from_str(raw)?;
    payload_to_confirmation(payload)
}

/// Parse an already-decoded JSON value into a confirmation set.
pub fn confirmation_from_value(
    value: serde_json::Value,
) -> Result<BackendConfirmation, BackendParseError> {
    let payload: BackendPayload = serde_json::from_value(value)?;
    payload_to_confirmation(payload)
}

/// Hot-path helper: a missing or malformed payload yields an empty set.
pub fn confirmation_or_empty(raw: Option<&str>) -> BackendConfirmation {
    degrade(raw.map(parse_confirmation))
}

/// [`confirmation_or_empty`] for a payload that arrived already decoded,
/// e.g. embedded in a larger JSON document.
pub fn confirmation_value_or_empty(value: Option<serde_json::Value>) -> BackendConfirmation {
    degrade(value.map(confirmation_from_value))
}

fn degrade(parsed: Option<Result<BackendConfirmation, BackendParseError>>) -> BackendConfirmation {
    match parsed {
        None => BackendConfirmation::empty(),
        Some(Ok(set)) => set,
        Some(Err(e)) => {
            warn!(error = %e, "ignoring backend confirmation");
            BackendConfirmation::empty()
        }
    }
}

/// JSON Schema of [`BackendPayload`], for constraining the remote pass.
pub fn backend_schema() -> serde_json::Value {
    serde_json::to_value(schema_for!(BackendPayload)).unwrap_or(serde_json::Value::Null)
}

fn payload_to_confirmation(
    payload: BackendPayload,
) -> Result<BackendConfirmation, BackendParseError> {
    if let Some(idx) = payload.hazards.iter().position(|h| h.trim().is_empty()) {
        return Err(BackendParseError::BlankLabel(idx));
    }
    Ok(BackendConfirmation::from_labels(&payload.hazards))
}
