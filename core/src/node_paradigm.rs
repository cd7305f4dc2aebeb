// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Node paradigm — membership and propagation
//!
//! `ping` and `sync` handlers (§4.7), plus the `Membership` facade that
//! drives outbound `ping`/`create`/`sync` calls. Grounded on the original
//! `NodeParadigm`/`NodeValidator`/`Node.create` trio, split so the
//! repository (`peer.rs`) stays a dumb store and this module owns the
//! ping-before-insert / recursive-sync orchestration (§9, redesign note 5).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::client;
use crate::config::Config;
use crate::envelope::{Envelope, Id, Kind};
use crate::error::{CoreError, CoreResult};
use crate::paradigm::{build_request, Method};
use crate::peer::{Peer, PeerStore};

pub const PARADIGM_NAME: &str = "node";

/// `ping` (§4.7, §6): request carries only the envelope; response is
/// `{code: "OK"}`.
pub struct PingMethod;

#[async_trait]
impl Method for PingMethod {
    fn request_schema(&self) -> Value {
        json!({ "properties": {} })
    }

    fn response_schema(&self) -> Value {
        json!({
            "properties": { "code": { "enum": ["OK", "FAILED"] } },
            "required": ["code"]
        })
    }

    async fn handle(&self, _request: &Envelope) -> CoreResult<Map<String, Value>> {
        let mut body = Map::new();
        body.insert("code".into(), json!("OK"));
        Ok(body)
    }
}

/// `sync` (§4.7): as a side effect of handling an inbound sync request,
/// creates locally every address the caller knows that this node doesn't
/// (`incoming \ local`), recursively syncing with each to accelerate
/// convergence; responds with `local \ incoming`, sorted ascending.
pub struct SyncMethod {
    store: Arc<dyn PeerStore>,
    local_address: String,
    config: Config,
}

impl SyncMethod {
    pub fn new(store: Arc<dyn PeerStore>, local_address: String, config: Config) -> Self {
        Self {
            store,
            local_address,
            config,
        }
    }
}

#[async_trait]
impl Method for SyncMethod {
    fn request_schema(&self) -> Value {
        json!({
            "properties": { "nodes": { "type": "array", "items": { "type": "string" } } },
            "required": ["nodes"]
        })
    }

    fn response_schema(&self) -> Value {
        json!({
            "properties": { "nodes": { "type": "array", "items": { "type": "string" } } },
            "required": ["nodes"]
        })
    }

    async fn handle(&self, request: &Envelope) -> CoreResult<Map<String, Value>> {
        let incoming: Vec<String> = request
            .extra
            .get("nodes")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        let membership = Membership::new(Arc::clone(&self.store), self.local_address.clone(), self.config);

        let mut local: Vec<String> = self
            .store
            .list()?
            .into_iter()
            .map(|p| p.address)
            .filter(|a| *a != self.local_address)
            .collect();

        for address in &incoming {
            if address != &self.local_address && !self.store.exists(address)? {
                // recursive sync to accelerate convergence (§4.7)
                let _ = membership.create(address, true).await;
            }
        }

        local.retain(|address| !incoming.contains(address));
        local.sort();

        let mut body = Map::new();
        body.insert("nodes".into(), json!(local));
        Ok(body)
    }
}

/// Normalises an address to `host:port`, appending the default port if the
/// address carries no `:<digits>` suffix (§4.3).
pub fn normalize_address(address: &str, default_port: u16) -> String {
    match address.rsplit_once(':') {
        Some((_, port)) if port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() => {
            address.to_string()
        }
        _ => format!("{address}:{default_port}"),
    }
}

/// Drives outbound `ping`, `create`, and `sync` on behalf of the local
/// node (§4.3, §4.7, §4.8).
#[derive(Clone)]
pub struct Membership {
    store: Arc<dyn PeerStore>,
    local_address: String,
    config: Config,
}

impl Membership {
    pub fn new(store: Arc<dyn PeerStore>, local_address: String, config: Config) -> Self {
        Self {
            store,
            local_address,
            config,
        }
    }

    fn request_id(&self, to: &str) -> Id {
        Id {
            uuid: Uuid::new_v4().to_string(),
            from: self.local_address.clone(),
            to: to.to_string(),
            kind: Kind::Req,
        }
    }

    /// Liveness probe (§4.7, §8 scenario 1/2). Returns `true` iff a
    /// response was received and carried `code == "OK"`.
    pub async fn ping(&self, address: &str) -> bool {
        let envelope = build_request(self.request_id(address), PARADIGM_NAME, "ping", Map::new());
        match client::send(address, &envelope.into_value(), &self.config).await {
            Ok(response) => {
                let ok = response.get("code").and_then(Value::as_str) == Some("OK");
                if ok {
                    let _ = self.store.touch_last_seen(address);
                }
                ok
            }
            Err(e) => {
                tracing::warn!(address, error = %e, "ping failed");
                false
            }
        }
    }

    /// `create(address, sync)` (§4.3): normalises the address, refuses
    /// duplicates, pings before inserting, and — if `sync` is true —
    /// immediately syncs with the newly-added peer.
    pub async fn create(&self, address: &str, sync: bool) -> CoreResult<Option<Peer>> {
        let address = normalize_address(address, crate::config::DEFAULT_PORT);

        if self.store.exists(&address)? {
            tracing::debug!(address, "peer already known, create is a no-op");
            return Ok(None);
        }

        if !self.ping(&address).await {
            return Err(CoreError::Handler(format!(
                "ping failed for {address}, refusing to insert"
            )));
        }

        let peer = self.store.create(&address)?;
        if sync && peer.is_some() {
            if let Err(e) = self.sync(&address).await {
                tracing::warn!(address, error = %e, "sync after create failed");
            }
        }
        Ok(peer)
    }

    /// `sync(address)` (§4.7, §8 scenario 3/4): sends the full known
    /// peer list, then creates every address the peer returns WITHOUT
    /// recursive sync, to avoid a storm.
    pub async fn sync(&self, address: &str) -> CoreResult<()> {
        let nodes: Vec<String> = self
            .store
            .list()?
            .into_iter()
            .map(|p| p.address)
            .filter(|a| *a != self.local_address)
            .collect();

        let mut body = Map::new();
        body.insert("nodes".into(), json!(nodes));
        let envelope = build_request(self.request_id(address), PARADIGM_NAME, "sync", body);

        let response = client::send(address, &envelope.into_value(), &self.config).await?;
        let returned: Vec<String> = response
            .get("nodes")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        for address in returned {
            if address != self.local_address {
                self.store.create(&address)?;
            }
        }
        Ok(())
    }
}
