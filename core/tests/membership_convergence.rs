//! End-to-end scenarios from §8: real servers on loopback sockets,
//! exchanging ping and sync over the actual wire codec.

use std::sync::Arc;

use meshcore::{Config, Membership, PingMethod, Registry, Server, SledPeerStore, SyncMethod};
use tempfile::tempdir;
use tokio::net::TcpListener;

async fn reserve_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

async fn start_node(
    port: u16,
    known: &[&str],
) -> (Arc<Server>, Config, Arc<dyn meshcore::PeerStore>) {
    let dir = tempdir().unwrap();
    let db = sled::Config::new().temporary(true).open().unwrap();
    let store: Arc<dyn meshcore::PeerStore> = Arc::new(SledPeerStore::open(&db).unwrap());
    for address in known {
        store.create(address).unwrap();
    }

    let local_address = format!("127.0.0.1:{port}");
    let mut config = Config::with_port(port);
    config.pool_size = 4;

    let mut registry = Registry::new();
    registry.register(meshcore::NODE_PARADIGM, "ping", Arc::new(PingMethod));
    registry.register(
        meshcore::NODE_PARADIGM,
        "sync",
        Arc::new(SyncMethod::new(Arc::clone(&store), local_address, config)),
    );

    let pidfile = dir.path().join(format!("server-{port}.pid"));
    let server = Server::start(config, registry, pidfile).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    (server, config, store)
}

/// §8 scenario 3: A knows {b, c}, B knows {a, d}; after a single A→B sync
/// both sides' sets converge on the union. `c` and `d` are real, reachable
/// nodes here — per §4.3, a peer gated by `create()`'s liveness ping never
/// propagates if it can't be reached, so convergence of *new* addresses
/// across the gossip side-effect only holds for addresses a peer can
/// actually dial.
#[tokio::test]
async fn sync_converges_peer_sets_between_two_nodes() {
    let port_a = reserve_port().await;
    let port_b = reserve_port().await;
    let port_c = reserve_port().await;
    let port_d = reserve_port().await;
    let addr_a = format!("127.0.0.1:{port_a}");
    let addr_b = format!("127.0.0.1:{port_b}");
    let addr_c = format!("127.0.0.1:{port_c}");
    let addr_d = format!("127.0.0.1:{port_d}");

    let (server_c, _config_c, _store_c) = start_node(port_c, &[]).await;
    let (server_d, _config_d, _store_d) = start_node(port_d, &[]).await;
    let (server_b, _config_b, store_b) = start_node(port_b, &[addr_a.as_str(), addr_d.as_str()]).await;
    let (server_a, config_a, store_a) = start_node(port_a, &[addr_b.as_str(), addr_c.as_str()]).await;

    let membership_a = Membership::new(Arc::clone(&store_a), addr_a.clone(), config_a);
    membership_a.sync(&addr_b).await.unwrap();

    let a_peers: Vec<String> = store_a.list().unwrap().into_iter().map(|p| p.address).collect();
    let b_peers: Vec<String> = store_b.list().unwrap().into_iter().map(|p| p.address).collect();

    // A already knew b and c; the sync response hands it B's own set.
    assert!(a_peers.contains(&addr_b));
    assert!(a_peers.contains(&addr_c));
    assert!(a_peers.contains(&addr_d));

    // B already knew a and d; the inbound side effect created c, since c
    // is a real, pingable node.
    assert!(b_peers.contains(&addr_a));
    assert!(b_peers.contains(&addr_d));
    assert!(b_peers.contains(&addr_c));

    server_a.stop().await;
    server_b.stop().await;
    server_c.stop().await;
    server_d.stop().await;
}

/// §8 scenario 4: addresses learned from a sync response are created
/// without triggering their own recursive sync — the caller's side of the
/// exchange never gates on reachability, unlike the inbound side effect.
#[tokio::test]
async fn sync_response_addresses_are_created_without_recursive_sync() {
    let port_a = reserve_port().await;
    let port_b = reserve_port().await;
    let addr_a = format!("127.0.0.1:{port_a}");
    let addr_b = format!("127.0.0.1:{port_b}");

    // The peer named in B's sync response is not itself reachable; if the
    // caller recursively synced with it, this create would fail outright.
    let (server_b, _config_b, _store_b) = start_node(port_b, &["127.0.0.1:19999"]).await;
    let (server_a, config_a, store_a) = start_node(port_a, &[]).await;

    let membership_a = Membership::new(Arc::clone(&store_a), addr_a, config_a);
    membership_a.sync(&addr_b).await.unwrap();

    assert!(store_a.exists("127.0.0.1:19999").unwrap());

    server_a.stop().await;
    server_b.stop().await;
}
