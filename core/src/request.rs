// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Request object
//!
//! State for one in-flight exchange: the parsed payload, the computed
//! response, and the target host derivation (§3, §4.4).

use serde_json::{Map, Value};
use tokio::net::TcpStream;

use crate::envelope::{Envelope, Kind};
use crate::error::{CoreError, CoreResult};
use crate::paradigm::Registry;
use crate::{envelope, wire};

/// One in-flight request/response exchange.
///
/// `raw` is the exact top-level JSON object as received, kept around so an
/// invalid envelope can still have its original fields preserved in the
/// error response (§8, scenario 5). `envelope` is `None` iff `raw` failed
/// to parse into a well-formed envelope.
pub struct Request {
    pub raw: Value,
    pub envelope: Option<Envelope>,
    pub response: Option<Value>,
    /// Derived per §3's formula. Exposed for inspection/testing; this
    /// implementation never dials it directly because every exchange
    /// reuses the already-open inbound connection (see `SPEC_FULL.md`).
    pub host: Option<String>,
}

impl PartialEq for Request {
    /// Two requests compare equal iff their envelopes compare equal (§4.4).
    fn eq(&self, other: &Self) -> bool {
        self.envelope == other.envelope
    }
}

impl Request {
    pub fn new(raw: Value) -> Self {
        let envelope = Envelope::from_value(raw.clone()).ok();
        let host = envelope.as_ref().map(derive_host);
        Self {
            raw,
            envelope,
            response: None,
            host,
        }
    }

    /// The worker entry point (§4.4): compute the response, send it on
    /// `stream`, then block for one confirm frame before returning.
    pub async fn process(&mut self, registry: &Registry, stream: &mut TcpStream) -> CoreResult<()> {
        let decorated = self.compute_response(registry).await;
        self.response = Some(decorated.clone());

        wire::send_json(stream, &decorated).await?;

        match wire::recv_json(stream).await {
            Ok(confirm) => tracing::debug!(?confirm, "confirm received, no action taken"),
            Err(e) => tracing::warn!(error = %e, "no confirm received from peer"),
        }
        Ok(())
    }

    async fn compute_response(&self, registry: &Registry) -> Value {
        match self.try_handle(registry).await {
            Ok(value) => value,
            Err(e) => {
                let mut payload = Map::new();
                payload.insert("code".into(), Value::String(e.code().to_string()));
                payload.insert("message".into(), Value::String(e.to_string()));
                decorate(&self.raw, payload)
            }
        }
    }

    async fn try_handle(&self, registry: &Registry) -> CoreResult<Value> {
        let envelope = self
            .envelope
            .as_ref()
            .ok_or_else(|| CoreError::Validation("malformed envelope".into()))?;

        let handler = registry.resolve(&envelope.paradigm, &envelope.method)?;
        envelope::validate(&self.raw, &handler.request_schema())?;

        let body = handler.handle(envelope).await?;
        let response = decorate(&self.raw, body);
        envelope::validate(&response, &handler.response_schema())?;
        Ok(response)
    }
}

/// `kind==req` names the address the request was sent *to*; `kind==rep`
/// names the address it came *from* (§3).
fn derive_host(envelope: &Envelope) -> String {
    match envelope.id.kind {
        Kind::Req => format!("tcp://{}", envelope.id.to),
        Kind::Rep => format!("tcp://{}", envelope.id.from),
    }
}

/// Merges `payload` into a clone of `original`'s top-level object, payload
/// fields winning on conflict. Used both for decorating a successful
/// response with `{id, paradigm, method}` and for decorating an error
/// response while preserving whatever fields the original message carried.
fn decorate(original: &Value, payload: Map<String, Value>) -> Value {
    let mut base = original.as_object().cloned().unwrap_or_default();
    for (key, value) in payload {
        base.insert(key, value);
    }
    Value::Object(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paradigm::{Method, Registry};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct Ping;
    #[async_trait]
    impl Method for Ping {
        fn request_schema(&self) -> Value {
            json!({ "properties": {} })
        }
        fn response_schema(&self) -> Value {
            json!({ "properties": { "code": { "enum": ["OK", "FAILED"] } }, "required": ["code"] })
        }
        async fn handle(&self, _request: &Envelope) -> CoreResult<Map<String, Value>> {
            let mut body = Map::new();
            body.insert("code".into(), json!("OK"));
            Ok(body)
        }
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register("node", "ping", Arc::new(Ping));
        registry
    }

    fn ping_envelope_value() -> Value {
        json!({
            "id": { "uuid": "u1", "from": "localhost:9001", "to": "localhost:9002", "kind": "req" },
            "paradigm": "node",
            "method": "ping"
        })
    }

    #[test]
    fn host_is_derived_per_kind_for_req() {
        let request = Request::new(ping_envelope_value());
        assert_eq!(request.host.as_deref(), Some("tcp://localhost:9002"));
    }

    #[tokio::test]
    async fn successful_handler_decorates_with_original_id_paradigm_method() {
        let request = Request::new(ping_envelope_value());
        let response = request.compute_response(&registry()).await;
        assert_eq!(response["code"], json!("OK"));
        assert_eq!(response["paradigm"], json!("node"));
        assert_eq!(response["method"], json!("ping"));
        assert_eq!(response["id"]["uuid"], json!("u1"));
    }

    #[tokio::test]
    async fn invalid_envelope_preserves_original_fields_in_error_response() {
        let request = Request::new(json!({ "hehe": "fail" }));
        let response = request.compute_response(&registry()).await;
        assert_eq!(response["code"], json!("VALIDATION_ERROR"));
        assert_eq!(response["hehe"], json!("fail"));
        assert!(response.get("message").is_some());
    }

    #[tokio::test]
    async fn unknown_paradigm_surfaces_as_validation_error_with_original_id() {
        let mut value = ping_envelope_value();
        value["paradigm"] = json!("ghost");
        let request = Request::new(value);
        let response = request.compute_response(&registry()).await;
        assert_eq!(response["code"], json!("VALIDATION_ERROR"));
        assert_eq!(response["id"]["uuid"], json!("u1"));
    }

    #[test]
    fn two_requests_are_equal_iff_their_envelopes_are_equal() {
        let a = Request::new(ping_envelope_value());
        let b = Request::new(ping_envelope_value());
        assert!(a == b);

        let mut other_value = ping_envelope_value();
        other_value["id"]["uuid"] = json!("different");
        let c = Request::new(other_value);
        assert!(a != c);
    }
}
