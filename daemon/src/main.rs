// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # meshd
//!
//! Entry point for the `meshd` binary: parses CLI arguments, initializes
//! logging, and dispatches to the server runtime or the node registry
//! commands (§6). Grounded on `kitten/server.py`'s `start_server`/
//! `stop_server` module functions and the teacher's `node/src/main.rs`
//! `#[tokio::main]` + `match cli.command` shape.

mod cli;
mod logging;
mod paths;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use meshcore::{Config, Membership, PingMethod, Registry, SledPeerStore, SyncMethod};

use cli::{Cli, NodeAction, ServerAction, TopCommand};
use logging::LogFormat;

/// Exit code for a no-subcommand invocation (§6).
const EXIT_INVALID_ARGUMENT: u8 = 22;
/// Exit code for `server stop` against a missing pidfile (§6).
const EXIT_NOT_RUNNING: u8 = 1;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init_logging("meshd=info,meshcore=info", LogFormat::Pretty);

    let Some(command) = cli.command else {
        eprintln!("no command given; expected \"server\" or \"node\"");
        return Ok(ExitCode::from(EXIT_INVALID_ARGUMENT));
    };

    match command {
        TopCommand::Server { action } => match action.unwrap_or(ServerAction::Start) {
            ServerAction::Start => start_server(cli.port).await,
            ServerAction::Stop => stop_server(cli.port),
        },
        TopCommand::Node { action } => node_command(cli.port, action).await,
    }
}

async fn start_server(port: u16) -> Result<ExitCode> {
    paths::create_dirs().context("failed to create data/cache/log directories")?;
    let pidfile = paths::pidfile_path(port);
    let local_address = format!("127.0.0.1:{port}");

    tracing::info!(port, pidfile = %pidfile.display(), "starting meshd");

    let db_path = paths::data_dir().join("peers.db");
    let db = sled::open(&db_path).context("failed to open peer store")?;
    let store = Arc::new(SledPeerStore::open(&db)?);

    let config = Config::with_port(port);
    let mut registry = Registry::new();
    registry.register(
        meshcore::NODE_PARADIGM,
        "ping",
        Arc::new(PingMethod),
    );
    registry.register(
        meshcore::NODE_PARADIGM,
        "sync",
        Arc::new(SyncMethod::new(store, local_address, config)),
    );

    let server = meshcore::Server::start(config, registry, pidfile).await?;
    server.wait_for_shutdown().await;

    Ok(ExitCode::SUCCESS)
}

fn stop_server(port: u16) -> Result<ExitCode> {
    let pidfile = paths::pidfile_path(port);
    if !pidfile.exists() {
        tracing::error!(port, "pidfile not found; meshd not running on this port");
        return Ok(ExitCode::from(EXIT_NOT_RUNNING));
    }

    let contents = std::fs::read_to_string(&pidfile).context("failed to read pidfile")?;
    let pid: i32 = contents.trim().parse().context("pidfile did not contain a valid pid")?;

    tracing::info!(port, pid, "stopping meshd");
    send_sigint(pid);

    Ok(ExitCode::SUCCESS)
}

#[cfg(unix)]
fn send_sigint(pid: i32) {
    extern "C" {
        fn kill(pid: i32, sig: i32) -> i32;
    }
    const SIGINT: i32 = 2;
    unsafe {
        kill(pid, SIGINT);
    }
}

#[cfg(not(unix))]
fn send_sigint(_pid: i32) {
    tracing::warn!("signalling a running server is only supported on unix");
}

async fn node_command(port: u16, action: NodeAction) -> Result<ExitCode> {
    paths::create_dirs().context("failed to create data/cache/log directories")?;
    let db_path = paths::data_dir().join("peers.db");
    let db = sled::open(&db_path).context("failed to open peer store")?;
    let store = Arc::new(SledPeerStore::open(&db)?);
    let local_address = format!("127.0.0.1:{port}");
    let config = Config::with_port(port);
    let membership = Membership::new(store.clone(), local_address, config);

    match action {
        NodeAction::List { filter } => {
            use meshcore::PeerStore;
            let peers = store.list()?;
            for peer in peers {
                if filter.as_deref().map_or(true, |f| peer.address.contains(f)) {
                    println!("{}", peer.address);
                }
            }
        }
        NodeAction::Add { address } => {
            membership.create(&address, true).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
