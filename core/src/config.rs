// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Runtime configuration
//!
//! The tunables the protocol fixes as literals (§2, §4.6, §4.8, §4.9 of the
//! design this crate implements) live here instead of scattered through the
//! call sites, so they stay visible and testable.

use std::time::Duration;

/// Default port the listener binds when none is supplied.
pub const DEFAULT_PORT: u16 = 5555;

/// Worker pool size: bounds concurrent outbound sockets.
pub const DEFAULT_POOL_SIZE: usize = 5;

/// Worker scheduler's empty-queue poll interval.
pub const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Grace period granted to the listener and to each running worker on
/// teardown before they are forcibly cancelled.
pub const TEARDOWN_GRACE: Duration = Duration::from_secs(5);

/// `PeerClient::send` reply poll timeout.
pub const CLIENT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Runtime configuration for a server instance.
///
/// `Config::default()` reproduces the fixed values above; fields exist so
/// tests can shrink the pool size or the timeouts without touching the
/// constants used in production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub pool_size: usize,
    pub worker_poll_interval: Duration,
    pub teardown_grace: Duration,
    pub client_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            pool_size: DEFAULT_POOL_SIZE,
            worker_poll_interval: WORKER_POLL_INTERVAL,
            teardown_grace: TEARDOWN_GRACE,
            client_timeout: CLIENT_TIMEOUT,
        }
    }
}

impl Config {
    /// Builds a config for the given port, keeping every other default.
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.port, 5555);
        assert_eq!(cfg.pool_size, 5);
        assert_eq!(cfg.worker_poll_interval, Duration::from_millis(100));
        assert_eq!(cfg.teardown_grace, Duration::from_secs(5));
        assert_eq!(cfg.client_timeout, Duration::from_millis(2000));
    }

    #[test]
    fn with_port_overrides_only_the_port() {
        let cfg = Config::with_port(6000);
        assert_eq!(cfg.port, 6000);
        assert_eq!(cfg.pool_size, Config::default().pool_size);
    }
}
