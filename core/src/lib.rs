// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! Core runtime for a peer daemon in a self-propagating node mesh.
//!
//! Each instance accepts requests from peers, enqueues them for background
//! processing, dispatches each to a handler identified by a two-level name
//! (paradigm, method), and sends the result back on the same connection the
//! request arrived on. This crate owns the concurrent listener/worker/queue
//! pipeline, its lifecycle, the request/response envelope and its JSON
//! Schema validation, the transport framing, and the node-membership
//! protocol (ping and gossip-style sync) layered on top.
//!
//! Argument parsing, directory resolution, log formatting, and the
//! persistent peer store's concrete backend choice are left to collaborators
//! (see the `meshd` daemon crate); this crate only depends on the
//! [`peer::PeerStore`] trait, not on any particular store.

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod node_paradigm;
pub mod paradigm;
pub mod peer;
pub mod request;
pub mod server;
pub mod wire;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use node_paradigm::{Membership, PingMethod, SyncMethod, PARADIGM_NAME as NODE_PARADIGM};
pub use paradigm::{Method, Registry};
pub use peer::{Peer, PeerStore, SledPeerStore};
pub use request::Request;
pub use server::{is_running, Server};
