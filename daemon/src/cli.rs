// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # CLI interface
//!
//! Command-line argument structure for `meshd` using `clap` derive (§6).
//! `server` defaults to `start` when no action is given; the top level has
//! no default — invoking the binary with neither `server` nor `node` is a
//! distinct "no command" case the caller treats as an invalid invocation.

use clap::{Parser, Subcommand};

/// Peer daemon in a self-propagating node mesh.
#[derive(Parser, Debug)]
#[command(name = "meshd", about = "Peer daemon in a self-propagating node mesh", version)]
pub struct Cli {
    /// Port the local node listens on and is addressed by.
    #[arg(long, global = true, default_value_t = 5555)]
    pub port: u16,

    #[command(subcommand)]
    pub command: Option<TopCommand>,
}

#[derive(Subcommand, Debug)]
pub enum TopCommand {
    /// Manage the server runtime.
    Server {
        #[command(subcommand)]
        action: Option<ServerAction>,
    },
    /// Manage known peers.
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ServerAction {
    /// Start the runtime in the foreground (default).
    Start,
    /// Signal a running server on `--port` to stop.
    Stop,
}

#[derive(Subcommand, Debug)]
pub enum NodeAction {
    /// Print all peers whose address contains `--filter`.
    List {
        #[arg(long)]
        filter: Option<String>,
    },
    /// Resolve, ping, insert, and sync with a peer address.
    Add { address: String },
}
