// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Paradigm registry
//!
//! Replaces the original's name-convention dispatch (`M_request`/
//! `M_response` methods discovered by introspection, paradigm name
//! auto-derived from a class name) with a typed registry keyed by
//! `(paradigm, method)`, owned by the server runtime rather than global
//! mutable state (§9, redesign notes 1–3).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::envelope::{Envelope, Id};
use crate::error::CoreError;

/// One request/response pair within a paradigm.
///
/// `handle` computes the response body from the request body; schema
/// accessors return the method's request/response fragments used for
/// validation (§4.1). `handle` is async because the node paradigm's
/// `sync` handler recursively dials peers while computing its response.
#[async_trait]
pub trait Method: Send + Sync {
    fn request_schema(&self) -> Value;
    fn response_schema(&self) -> Value;
    async fn handle(&self, request: &Envelope) -> Result<Map<String, Value>, CoreError>;
}

/// A process-wide (in practice, server-owned) mapping from
/// `(paradigm, method)` to its handler. Populated at server setup and
/// read-only thereafter.
#[derive(Default, Clone)]
pub struct Registry {
    methods: BTreeMap<(String, String), Arc<dyn Method>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a method under an explicitly-named paradigm — no name is
    /// ever derived from a type (§9, redesign note 2).
    pub fn register(
        &mut self,
        paradigm: impl Into<String>,
        method: impl Into<String>,
        handler: Arc<dyn Method>,
    ) {
        self.methods
            .insert((paradigm.into(), method.into()), handler);
    }

    pub fn get(&self, paradigm: &str, method: &str) -> Option<Arc<dyn Method>> {
        self.methods
            .get(&(paradigm.to_string(), method.to_string()))
            .cloned()
    }

    /// All registered paradigm names, sorted alphabetically (used to build
    /// "unknown paradigm" error messages per §4.1).
    pub fn known_paradigms(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .methods
            .keys()
            .map(|(paradigm, _)| paradigm.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Methods known on a given paradigm, sorted alphabetically.
    pub fn known_methods(&self, paradigm: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .methods
            .keys()
            .filter(|(p, _)| p == paradigm)
            .map(|(_, method)| method.clone())
            .collect();
        names.sort();
        names
    }

    /// Resolves `(paradigm, method)`, producing a `Validation` error whose
    /// message names the offender and enumerates the available choices in
    /// stable alphabetical order (§4.1) when either is unknown.
    pub fn resolve(&self, paradigm: &str, method: &str) -> Result<Arc<dyn Method>, CoreError> {
        let paradigms = self.known_paradigms();
        if !paradigms.contains(&paradigm.to_string()) {
            return Err(CoreError::Validation(format!(
                "unknown paradigm '{paradigm}'; known paradigms: [{}]",
                paradigms.join(", ")
            )));
        }

        self.get(paradigm, method).ok_or_else(|| {
            let methods = self.known_methods(paradigm);
            CoreError::Validation(format!(
                "unknown method '{method}' on paradigm '{paradigm}'; known methods: [{}]",
                methods.join(", ")
            ))
        })
    }
}

/// Stamps `paradigm`/`method` onto a newly-built envelope — the one place
/// those two fields are ever set, replacing the original's return-value
/// decorator (§4.2).
pub fn build_request(
    id: Id,
    paradigm: impl Into<String>,
    method: impl Into<String>,
    body: Map<String, Value>,
) -> Envelope {
    Envelope::new(id, paradigm, method, body)
}
