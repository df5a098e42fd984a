use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::crypto::is_hex_digest;

/// Free-form metadata attached to a record (land id, roll number, ...)
pub type Payload = BTreeMap<String, serde_json::Value>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Malformed fingerprint: expected 64 hex chars, got {0:?}")]
    MalformedFingerprint(String),
}

/// Fields a collaborator supplies when submitting a record
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TransactionRequest {
    pub actor: String,
    pub action: String,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default)]
    pub fingerprint: Option<String>,
}

impl TransactionRequest {
    pub fn new(actor: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            action: action.into(),
            payload: Payload::new(),
            fingerprint: None,
        }
    }

    /// Attach a payload entry
    pub fn with_field(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Attach a content fingerprint (hex SHA-256)
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }
}

/// A ledger record. Mutable only while it sits in the pending buffer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub actor: String,
    pub action: String,
    pub payload: Payload,
    pub fingerprint: Option<String>,
    pub flagged: bool,
    pub flag_reason: Option<String>,
    pub timestamp: i64, // unix millis
}

impl Transaction {
    /// Validate the request and build an unflagged transaction.
    ///
    /// Actor and action must be non-blank. A fingerprint, when present, must
    /// be a hex SHA-256 digest; it is stored lowercase so lookups match
    /// regardless of how the collaborator spelled it.
    pub fn from_request(
        request: TransactionRequest,
        timestamp: i64,
    ) -> Result<Self, ValidationError> {
        if request.actor.trim().is_empty() {
            return Err(ValidationError::MissingField("actor"));
        }
        if request.action.trim().is_empty() {
            return Err(ValidationError::MissingField("action"));
        }
        let fingerprint = request
            .fingerprint
            .map(|fp| normalize_fingerprint(&fp))
            .transpose()?;

        Ok(Self {
            actor: request.actor,
            action: request.action,
            payload: request.payload,
            fingerprint,
            flagged: false,
            flag_reason: None,
            timestamp,
        })
    }

    /// Record the advisory duplicate outcome. Never rejects.
    pub fn flag(&mut self, reason: impl Into<String>) {
        self.flagged = true;
        self.flag_reason = Some(reason.into());
    }
}

/// Lowercase and validate a hex fingerprint
pub fn normalize_fingerprint(fingerprint: &str) -> Result<String, ValidationError> {
    let trimmed = fingerprint.trim();
    if !is_hex_digest(trimmed) {
        return Err(ValidationError::MalformedFingerprint(fingerprint.to_string()));
    }
    Ok(trimmed.to_ascii_lowercase())
}
