//! Upstream DNS forwarding.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::error::{Error, Result};

const MAX_REPLY_LEN: usize = 512;

/// Reply deadline used when no override is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// One upstream resolver endpoint.
///
/// Each query gets a fresh ephemeral socket, so stale state from a
/// non-responsive server never leaks into the next query. No retries.
#[derive(Debug, Clone)]
pub struct Upstream {
    addr: SocketAddr,
    timeout: Duration,
}

impl Upstream {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Send one raw DNS payload and wait for one reply.
    pub async fn resolve(&self, query: &[u8]) -> Result<Vec<u8>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(Error::Upstream)?;
        socket.connect(self.addr).await.map_err(Error::Upstream)?;
        socket.send(query).await.map_err(Error::Upstream)?;

        let mut buf = [0u8; MAX_REPLY_LEN];
        match tokio::time::timeout(self.timeout, socket.recv(&mut buf)).await {
            Ok(Ok(len)) => Ok(buf[..len].to_vec()),
            Ok(Err(e)) => Err(Error::Upstream(e)),
            Err(_) => Err(Error::UpstreamTimeout(self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn udp_bind_or_skip(addr: &str) -> Option<UdpSocket> {
        match UdpSocket::bind(addr).await {
            Ok(socket) => Some(socket),
            Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => None,
            Err(err) => panic!("failed to bind UDP socket for test: {err}"),
        }
    }

    #[tokio::test]
    async fn resolve_returns_upstream_reply() {
        let Some(server) = udp_bind_or_skip("127.0.0.1:0").await else {
            return;
        };
        let addr = server.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (len, peer) = server.recv_from(&mut buf).await.unwrap();
            let mut reply = buf[..len].to_vec();
            reply.extend_from_slice(b"-answered");
            server.send_to(&reply, peer).await.unwrap();
        });

        let upstream = Upstream::new(addr);
        let reply = upstream.resolve(b"query").await.unwrap();
        assert_eq!(reply, b"query-answered");
    }

    #[tokio::test]
    async fn resolve_times_out_when_upstream_is_silent() {
        let Some(server) = udp_bind_or_skip("127.0.0.1:0").await else {
            return;
        };
        let addr = server.local_addr().unwrap();

        // the bound server never answers
        let upstream = Upstream::new(addr).with_timeout(Duration::from_millis(50));
        match upstream.resolve(b"query").await {
            Err(Error::UpstreamTimeout(_)) => {}
            other => panic!("expected timeout, got {other:?}"),
        }
        drop(server);
    }
}
