//! Sends one question at a time to the upstream resolver.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::config::MAX_UDP_PAYLOAD;
use crate::dns_hdr::Header;
use crate::dns_rr::Question;
use crate::error::{DnsError, Result};

/// One request/reply exchange with an upstream resolver.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn exchange(&self, query: Bytes) -> Result<Bytes>;
}

/// Talks to the resolver over a fresh UDP socket per exchange.
pub struct UdpUpstream {
    addr: SocketAddr,
    timeout: Duration,
}

impl UdpUpstream {
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        Self { addr, timeout }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn unreachable(&self, source: io::Error) -> DnsError {
        DnsError::UpstreamUnreachable {
            addr: self.addr.to_string(),
            source,
        }
    }
}

#[async_trait]
impl Upstream for UdpUpstream {
    async fn exchange(&self, query: Bytes) -> Result<Bytes> {
        let local: SocketAddr = if self.addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| self.unreachable(e))?;
        socket
            .connect(self.addr)
            .await
            .map_err(|e| self.unreachable(e))?;

        timeout(self.timeout, socket.send(&query))
            .await
            .map_err(|_| self.unreachable(io::ErrorKind::TimedOut.into()))?
            .map_err(|e| self.unreachable(e))?;

        let mut buf = vec![0u8; MAX_UDP_PAYLOAD];
        let len = timeout(self.timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| DnsError::UpstreamTimeout {
                addr: self.addr.to_string(),
                timeout_ms: self.timeout.as_millis(),
            })?
            .map_err(|source| DnsError::UpstreamReadFailure {
                addr: self.addr.to_string(),
                source,
            })?;

        buf.truncate(len);
        trace!(upstream = %self.addr, len, "received upstream reply");
        Ok(Bytes::from(buf))
    }
}

pub struct Forwarder {
    upstream: Arc<dyn Upstream>,
    rng: Mutex<StdRng>,
}

impl Forwarder {
    /// Creates a forwarder whose transaction ids come from an OS-seeded
    /// generator.
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self::with_rng(upstream, StdRng::from_entropy())
    }

    pub fn with_rng(upstream: Arc<dyn Upstream>, rng: StdRng) -> Self {
        Self {
            upstream,
            rng: Mutex::new(rng),
        }
    }

    fn next_id(&self) -> u16 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen()
    }

    /// Wire form of a single-question query carrying `question`.
    pub fn build_query(id: u16, question: &Question, original: &Header) -> Bytes {
        let mut buf = BytesMut::with_capacity(MAX_UDP_PAYLOAD);
        Header::upstream_query(id, original).to_bytes(&mut buf);
        question.to_bytes(&mut buf);
        buf.freeze()
    }

    /// Asks the upstream about `question` alone and returns its raw reply.
    ///
    /// The query gets a fresh random id rather than the client's; a reply
    /// carrying any other id is rejected.
    pub async fn forward(&self, question: &Question, original: &Header) -> Result<Bytes> {
        let id = self.next_id();
        let query = Self::build_query(id, question, original);

        debug!(%question, upstream_id = id, "forwarding question");
        let reply = self.upstream.exchange(query).await?;

        let header = Header::from_bytes(&reply)?;
        if header.id != id {
            return Err(DnsError::UpstreamIdMismatch {
                expected: id,
                got: header.id,
            });
        }

        Ok(reply)
    }
}
