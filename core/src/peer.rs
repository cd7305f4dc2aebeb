// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Peer store
//!
//! Replaces the original's SQLAlchemy ORM base class with plain records
//! plus a repository interface exposing `list`, `exists`, `create`,
//! `touch_last_seen` (§9, redesign note 5). The `sled` implementation is
//! the only one shipped; other backends only need to implement `PeerStore`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// A known peer. `address` (`host:port`) is the natural key and must be
/// unique within a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Repository over known peer addresses.
///
/// Every handler that touches the store opens and performs one operation
/// per call; nothing here holds a session open across a suspension point
/// (§5: "every handler opens and closes its own session").
pub trait PeerStore: Send + Sync {
    fn list(&self) -> CoreResult<Vec<Peer>>;
    fn exists(&self, address: &str) -> CoreResult<bool>;
    /// Inserts a new peer record. Returns `Ok(None)` without altering the
    /// store if `address` is already present (idempotent create, §8).
    fn create(&self, address: &str) -> CoreResult<Option<Peer>>;
    fn touch_last_seen(&self, address: &str) -> CoreResult<()>;
}

/// `sled`-backed peer store. The teacher's dependency stack already
/// carries `sled`; this reuses it directly instead of introducing a SQL
/// ORM equivalent.
pub struct SledPeerStore {
    tree: sled::Tree,
}

impl SledPeerStore {
    pub fn open(db: &sled::Db) -> CoreResult<Self> {
        let tree = db
            .open_tree("peers")
            .map_err(|e| CoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        Ok(Self { tree })
    }

    fn get_raw(&self, address: &str) -> CoreResult<Option<Peer>> {
        match self.tree.get(address.as_bytes()) {
            Ok(Some(bytes)) => {
                let peer: Peer = serde_json::from_slice(&bytes).map_err(|e| {
                    CoreError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
                })?;
                Ok(Some(peer))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(CoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))),
        }
    }

    fn put_raw(&self, peer: &Peer) -> CoreResult<()> {
        let bytes = serde_json::to_vec(peer)
            .map_err(|e| CoreError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        self.tree
            .insert(peer.address.as_bytes(), bytes)
            .map_err(|e| CoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        Ok(())
    }
}

impl PeerStore for SledPeerStore {
    fn list(&self) -> CoreResult<Vec<Peer>> {
        let mut peers = Vec::new();
        for entry in self.tree.iter() {
            let (_, bytes) =
                entry.map_err(|e| CoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
            let peer: Peer = serde_json::from_slice(&bytes).map_err(|e| {
                CoreError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            })?;
            peers.push(peer);
        }
        peers.sort_by(|a, b| a.address.cmp(&b.address));
        Ok(peers)
    }

    fn exists(&self, address: &str) -> CoreResult<bool> {
        Ok(self.get_raw(address)?.is_some())
    }

    fn create(&self, address: &str) -> CoreResult<Option<Peer>> {
        if self.exists(address)? {
            tracing::debug!(address, "peer already known, create is a no-op");
            return Ok(None);
        }

        let now = Utc::now();
        let peer = Peer {
            id: uuid::Uuid::new_v4().to_string(),
            address: address.to_string(),
            created_at: now,
            last_seen_at: now,
        };
        self.put_raw(&peer)?;
        tracing::info!(address, "peer created");
        Ok(Some(peer))
    }

    fn touch_last_seen(&self, address: &str) -> CoreResult<()> {
        if let Some(mut peer) = self.get_raw(address)? {
            peer.last_seen_at = Utc::now();
            self.put_raw(&peer)?;
        }
        Ok(())
    }
}
