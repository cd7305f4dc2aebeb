// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Server runtime
//!
//! The listener loop, ack-and-enqueue handler, worker pool, pidfile
//! manager, signal handler, and teardown coordinator (§4.5, §4.6, §4.9).
//! Grounded on `original_source/kitten/server.py`'s `KittenServer` for the
//! lifecycle shape, reimplemented as a cooperative `tokio` scheduler
//! instead of `gevent`.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::paradigm::Registry;
use crate::request::Request;
use crate::wire;

/// One accepted connection, already acked, waiting for a worker.
type Pending = (Value, TcpStream);

/// Unbounded FIFO of pending requests. Lifetime = server process (§3).
type Queue = Arc<Mutex<VecDeque<Pending>>>;

struct Tasks {
    listener: JoinHandle<()>,
    scheduler: JoinHandle<()>,
    signals: JoinHandle<()>,
}

/// The running server. One instance per process; `start` binds the
/// listener and spawns the three task classes named in §5 (listener,
/// worker-scheduler, signal handler); `stop` tears all three down.
pub struct Server {
    config: Config,
    pidfile_path: PathBuf,
    torn: Arc<AtomicBool>,
    queue: Queue,
    tasks: Mutex<Option<Tasks>>,
}

impl Server {
    /// Binds the listener, writes the pidfile, and spawns the listener,
    /// worker-scheduler, and signal-handling tasks (§4.9).
    ///
    /// On bind failure the pidfile is not created; if writing the pidfile
    /// fails after a successful bind, the bind's listener is simply
    /// dropped and no partially-created pidfile is left behind.
    pub async fn start(
        config: Config,
        registry: Registry,
        pidfile_path: PathBuf,
    ) -> CoreResult<Arc<Self>> {
        let listener = TcpListener::bind(("0.0.0.0", config.port))
            .await
            .map_err(|e| CoreError::Startup(format!("failed to bind port {}: {e}", config.port)))?;

        write_pidfile(&pidfile_path)?;

        let torn = Arc::new(AtomicBool::new(false));
        let queue: Queue = Arc::new(Mutex::new(VecDeque::new()));
        let semaphore = Arc::new(Semaphore::new(config.pool_size));
        let registry = Arc::new(registry);

        let server = Arc::new(Self {
            config,
            pidfile_path,
            torn: Arc::clone(&torn),
            queue: Arc::clone(&queue),
            tasks: Mutex::new(None),
        });

        let listener_task = tokio::spawn(listener_loop(listener, Arc::clone(&queue), Arc::clone(&torn)));
        let scheduler_task = tokio::spawn(worker_scheduler(
            queue,
            semaphore,
            registry,
            config,
            Arc::clone(&torn),
        ));
        let signal_task = tokio::spawn(signal_watcher(Arc::clone(&server)));

        *server.tasks.lock() = Some(Tasks {
            listener: listener_task,
            scheduler: scheduler_task,
            signals: signal_task,
        });

        tracing::info!(port = server.config.port, "server started");
        Ok(server)
    }

    /// Idempotent graceful teardown (§4.9). The second call is a no-op.
    pub async fn stop(&self) {
        if self.torn.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("stopping server");

        let tasks = self.tasks.lock().take();
        if let Some(tasks) = tasks {
            let listener_abort = tasks.listener.abort_handle();
            if timeout(self.config.teardown_grace, tasks.listener).await.is_err() {
                tracing::warn!("listener did not stop within the grace period, cancelling");
                listener_abort.abort();
            }

            let scheduler_abort = tasks.scheduler.abort_handle();
            if timeout(self.config.teardown_grace, tasks.scheduler).await.is_err() {
                tracing::warn!("worker scheduler did not stop within the grace period, cancelling");
                scheduler_abort.abort();
            }

            tasks.signals.abort();
        }

        if let Err(e) = std::fs::remove_file(&self.pidfile_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(error = %e, "failed to remove pidfile");
            }
        }
        tracing::info!("server stopped");
    }

    /// Blocks until `stop()` has been called (by a signal handler or a
    /// caller), for use as the daemon binary's main await point.
    pub async fn wait_for_shutdown(&self) {
        while !self.torn.load(Ordering::SeqCst) {
            tokio::time::sleep(self.config.worker_poll_interval).await;
        }
    }
}

async fn listener_loop(listener: TcpListener, queue: Queue, torn: Arc<AtomicBool>) {
    loop {
        if torn.load(Ordering::SeqCst) {
            return;
        }

        let (mut stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!(error = %e, "listener accept failed, terminating loop");
                return;
            }
        };

        let raw = match wire::recv_json(&mut stream).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(peer = %peer_addr, error = %e, "transport interrupted before a request was received, terminating loop");
                return;
            }
        };

        // The ack is synchronous and independent of the handler's output —
        // the listener never itself executes a handler (§4.5).
        if let Err(e) = wire::send_json(&mut stream, &json!({"ack": true})).await {
            tracing::error!(peer = %peer_addr, error = %e, "failed to send ack, terminating loop");
            return;
        }

        queue.lock().push_back((raw, stream));
    }
}

async fn worker_scheduler(
    queue: Queue,
    semaphore: Arc<Semaphore>,
    registry: Arc<Registry>,
    config: Config,
    torn: Arc<AtomicBool>,
) {
    loop {
        if torn.load(Ordering::SeqCst) {
            return;
        }

        let popped = queue.lock().pop_front();
        let Some((raw, mut stream)) = popped else {
            tokio::time::sleep(config.worker_poll_interval).await;
            continue;
        };

        // Over-cap puts block the scheduler until a slot frees (§4.6).
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        let registry = Arc::clone(&registry);
        let grace = config.teardown_grace;
        tokio::spawn(async move {
            let mut request = Request::new(raw);
            let outcome = timeout(grace, request.process(&registry, &mut stream)).await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "worker failed to process request"),
                Err(_) => tracing::warn!("worker cancelled after exceeding the teardown grace period"),
            }
            // The socket and the permit are both dropped here — the
            // worker has released its outbound resources before
            // returning to the pool (I3).
            drop(permit);
        });
    }
}

async fn signal_watcher(server: Arc<Server>) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            sig.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received interrupt signal"),
        _ = terminate => tracing::info!("received terminate signal"),
    }

    server.stop().await;
}

fn write_pidfile(path: &Path) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, std::process::id().to_string())?;
    Ok(())
}

/// `is_running(port)` (§4.9, §8): true iff the pidfile exists AND the
/// process it names is still alive. A stale pidfile reads as "not
/// running".
pub fn is_running(pidfile_path: &Path) -> bool {
    let Ok(contents) = std::fs::read_to_string(pidfile_path) else {
        return false;
    };
    let Ok(pid) = contents.trim().parse::<u32>() else {
        return false;
    };
    process_exists(pid)
}

#[cfg(target_os = "linux")]
fn process_exists(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_exists(pid: u32) -> bool {
    // No /proc on this platform; signal 0 probes existence without
    // actually delivering a signal.
    #[cfg(unix)]
    {
        unsafe { libc_kill_probe(pid) }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
fn libc_kill_probe(pid: u32) -> bool {
    extern "C" {
        fn kill(pid: i32, sig: i32) -> i32;
    }
    unsafe { kill(pid as i32, 0) == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client;
    use crate::node_paradigm::{PingMethod, PARADIGM_NAME};
    use tempfile::tempdir;

    fn registry_with_ping() -> Registry {
        let mut registry = Registry::new();
        registry.register(PARADIGM_NAME, "ping", std::sync::Arc::new(PingMethod));
        registry
    }

    #[tokio::test]
    async fn pidfile_exists_while_running_and_is_removed_after_stop() {
        let dir = tempdir().unwrap();
        let pidfile = dir.path().join("server-0.pid");

        let mut config = Config::with_port(0);
        config.pool_size = 1;
        let server = Server::start(config, registry_with_ping(), pidfile.clone())
            .await
            .unwrap();

        assert!(pidfile.exists());
        let contents = std::fs::read_to_string(&pidfile).unwrap();
        assert_eq!(contents, std::process::id().to_string());
        assert!(is_running(&pidfile));

        server.stop().await;
        assert!(!pidfile.exists());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let dir = tempdir().unwrap();
        let pidfile = dir.path().join("server.pid");
        let server = Server::start(Config::with_port(0), registry_with_ping(), pidfile)
            .await
            .unwrap();

        server.stop().await;
        server.stop().await; // must not panic or double-delete
    }

    #[tokio::test]
    async fn is_running_is_false_for_a_missing_pidfile() {
        let dir = tempdir().unwrap();
        let pidfile = dir.path().join("missing.pid");
        assert!(!is_running(&pidfile));
    }

    #[tokio::test]
    async fn is_running_is_false_for_a_stale_pid() {
        let dir = tempdir().unwrap();
        let pidfile = dir.path().join("stale.pid");
        // PID 1 may or may not be us, so use an implausibly large PID
        // extremely unlikely to be assigned on any test host.
        std::fs::write(&pidfile, "4000000000").unwrap();
        assert!(!is_running(&pidfile));
    }

    #[tokio::test]
    async fn end_to_end_ping_round_trip_over_the_real_listener() {
        let dir = tempdir().unwrap();
        let pidfile = dir.path().join("ping.pid");

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // free the port for the server to rebind

        let mut config = Config::with_port(addr.port());
        config.pool_size = 1;
        let server = Server::start(config, registry_with_ping(), pidfile)
            .await
            .unwrap();

        // Give the listener a moment to start accepting.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let request = json!({
            "id": { "uuid": "u1", "from": "localhost:9001", "to": addr.to_string(), "kind": "req" },
            "paradigm": "node",
            "method": "ping"
        });
        let reply = client::send(&addr.to_string(), &request, &config).await.unwrap();
        assert_eq!(reply["code"], json!("OK"));

        server.stop().await;
    }
}
