// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Peer client
//!
//! Outbound send with a bounded reply poll (§4.8). Each call establishes
//! and tears down its own connection — no connection reuse on the client
//! side (the listener-side connection reuse used to deliver a computed
//! response is a different, unrelated mechanism — see `request.rs`).

use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::wire;

/// Sends `request` to `address` and waits for the peer's real reply,
/// bounded by `config.client_timeout` (default 2000 ms). On timeout the
/// socket is dropped and a `Timeout` error is returned.
///
/// The peer's listener acks the request on the same connection before its
/// worker has computed a response (see `server.rs`'s listener loop), so the
/// first frame received here is always `{ack: true}`, not the substantive
/// reply. That frame is read and discarded; the second frame is the
/// decorated response and is what this function returns.
pub async fn send(address: &str, request: &Value, config: &Config) -> CoreResult<Value> {
    let connect = timeout(config.client_timeout, TcpStream::connect(address));
    let mut stream = match connect.await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(CoreError::Transport(e.to_string())),
        Err(_) => return Err(CoreError::Timeout),
    };

    wire::send_json(&mut stream, request).await?;

    match timeout(config.client_timeout, wire::recv_json(&mut stream)).await {
        Ok(Ok(_ack)) => {}
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            drop(stream);
            return Err(CoreError::Timeout);
        }
    }

    match timeout(config.client_timeout, wire::recv_json(&mut stream)).await {
        Ok(result) => result,
        Err(_) => {
            drop(stream);
            Err(CoreError::Timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn discards_the_ack_frame_and_returns_the_real_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = wire::recv_json(&mut stream).await.unwrap();
            assert_eq!(request, json!({"ping": true}));
            // The listener acks first, then the worker sends the real
            // decorated response on the same connection (server.rs).
            wire::send_json(&mut stream, &json!({"ack": true})).await.unwrap();
            wire::send_json(&mut stream, &json!({"code": "OK"})).await.unwrap();
        });

        let config = Config::default();
        let reply = send(&addr.to_string(), &json!({"ping": true}), &config)
            .await
            .unwrap();
        assert_eq!(reply, json!({"code": "OK"}));
    }

    #[tokio::test]
    async fn times_out_when_the_peer_never_acks() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            // Accept but never reply; hold the connection open past the deadline.
            tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            drop(stream);
        });

        let mut config = Config::default();
        config.client_timeout = std::time::Duration::from_millis(50);

        let result = send(&addr.to_string(), &json!({"ping": true}), &config).await;
        assert!(matches!(result, Err(CoreError::Timeout)));
    }

    #[tokio::test]
    async fn times_out_when_the_peer_acks_but_never_sends_the_real_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            wire::send_json(&mut stream, &json!({"ack": true})).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            drop(stream);
        });

        let mut config = Config::default();
        config.client_timeout = std::time::Duration::from_millis(50);

        let result = send(&addr.to_string(), &json!({"ping": true}), &config).await;
        assert!(matches!(result, Err(CoreError::Timeout)));
    }

    #[tokio::test]
    async fn connection_refused_surfaces_as_transport_error() {
        let config = Config::default();
        // Nothing is listening on this port.
        let result = send("127.0.0.1:1", &json!({"ping": true}), &config).await;
        assert!(matches!(result, Err(CoreError::Transport(_))));
    }
}
