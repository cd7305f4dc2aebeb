// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Envelope & validator
//!
//! The invariant top-level message fields shared by every request and
//! response (§3), plus the JSON Schema machinery that validates a message
//! against the envelope merged with its method's schema fragment (§4.1).

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::CoreError;

/// Which side of an exchange a message represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Req,
    Rep,
}

/// The `id` sub-object carried by every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Id {
    pub uuid: String,
    pub from: String,
    pub to: String,
    pub kind: Kind,
}

/// A fully-parsed message: envelope fields plus whatever method-specific
/// fields were merged at the top level.
///
/// Two envelopes compare equal iff their `id`, `paradigm`, `method`, and
/// extra fields all compare equal (§4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Id,
    pub paradigm: String,
    pub method: String,
    /// Method-specific fields, merged at the top level on the wire but
    /// kept separate here for convenient access.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    /// Builds a new envelope, stamping `paradigm`/`method` as the registry
    /// decorator would (§4.2) — callers never set those fields directly.
    pub fn new(id: Id, paradigm: impl Into<String>, method: impl Into<String>, extra: Map<String, Value>) -> Self {
        Self {
            id,
            paradigm: paradigm.into(),
            method: method.into(),
            extra,
        }
    }

    /// Re-derives an envelope from a raw JSON value, surfacing a tagged
    /// validation error instead of panicking on malformed input.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        serde_json::from_value(value)
            .map_err(|e| CoreError::Validation(format!("malformed envelope: {e}")))
    }

    pub fn into_value(self) -> Value {
        serde_json::to_value(self).expect("envelope always serializes")
    }
}

/// The fixed, re-used envelope schema (§4.1: "a pristine envelope schema
/// is re-used"). Cloned on every validation, never mutated in place.
pub fn core_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": {
                "type": "object",
                "properties": {
                    "uuid": { "type": "string" },
                    "from": { "type": "string" },
                    "to": { "type": "string" },
                    "kind": { "enum": ["req", "rep"] }
                },
                "required": ["uuid", "from", "to", "kind"],
                "additionalProperties": false
            },
            "paradigm": { "type": "string" },
            "method": { "type": "string" }
        },
        "required": ["id", "paradigm", "method"],
        "additionalProperties": false
    })
}

/// Key-merges a method schema fragment's `properties` (and `required`)
/// into a clone of the envelope schema, preserving
/// `additionalProperties: false`. The merged schema is discarded after use.
pub fn merge_schema(fragment: &Value) -> Value {
    let mut merged = core_schema();
    let Some(merged_obj) = merged.as_object_mut() else {
        unreachable!("core_schema always returns an object");
    };

    let fragment_properties = fragment
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    if let Some(properties) = merged_obj.get_mut("properties").and_then(Value::as_object_mut) {
        for (key, value) in fragment_properties {
            properties.insert(key, value);
        }
    }

    if let Some(fragment_required) = fragment.get("required").and_then(Value::as_array) {
        if let Some(required) = merged_obj.get_mut("required").and_then(Value::as_array_mut) {
            for entry in fragment_required {
                if !required.contains(entry) {
                    required.push(entry.clone());
                }
            }
        }
    }

    merged
}

/// Validates `candidate` against the envelope schema merged with
/// `fragment`. Returns a tagged `Validation` error naming the failure on
/// mismatch.
pub fn validate(candidate: &Value, fragment: &Value) -> Result<(), CoreError> {
    let schema = merge_schema(fragment);
    let compiled = jsonschema::JSONSchema::compile(&schema)
        .map_err(|e| CoreError::Validation(format!("invalid schema: {e}")))?;

    if let Err(errors) = compiled.validate(candidate) {
        let message = errors
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(CoreError::Validation(message));
    }
    Ok(())
}
