//! Envelope validation and SQL identifier checks.

use std::sync::LazyLock;

use regex::Regex;
use validator::{Validate, ValidationErrors};

use crate::envelope::MeasurementEnvelope;
use crate::error::{Error, Result};
use crate::limits::MAX_ENVELOPE_SIZE_BYTES;

/// Identifiers may only contain ASCII letters, digits and underscores.
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("identifier pattern is valid"));

/// Validates raw envelope size BEFORE deserialization.
pub fn validate_envelope_size(raw_bytes: &[u8]) -> Result<()> {
    if raw_bytes.len() > MAX_ENVELOPE_SIZE_BYTES {
        return Err(Error::EnvelopeTooLarge {
            size_kb: raw_bytes.len() / 1024,
            limit_kb: MAX_ENVELOPE_SIZE_BYTES / 1024,
        });
    }
    Ok(())
}

/// Rejects structurally invalid envelopes.
///
/// The returned message is meant to be shown to the caller as-is.
pub fn validate_envelope(envelope: &MeasurementEnvelope) -> Result<()> {
    envelope
        .validate()
        .map_err(|e| Error::validation(first_message(&e)))
}

/// Checks a table or column name against the identifier allow-list.
///
/// Identifiers cannot be bound as statement parameters, so every name that
/// ends up in generated SQL must pass through here first.
pub fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(Error::configuration(format!(
            "invalid {} name {:?}: only letters, digits and underscores are allowed",
            kind, name
        )))
    }
}

fn first_message(errors: &ValidationErrors) -> String {
    // Report fields in declaration order so the message is stable.
    let order = ["db_name", "metric_name", "data"];
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by_key(|(field, _)| {
        let field: &str = field.as_ref();
        order.iter().position(|f| *f == field).unwrap_or(order.len())
    });

    fields
        .iter()
        .flat_map(|(_, errs)| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| errors.to_string())
}
