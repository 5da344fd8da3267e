use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::Semaphore;
use tracing::{info, trace, warn};

use crate::config::MAX_UDP_PAYLOAD;
use crate::dispatcher::RequestDispatcher;

pub struct DNSServer {
    socket: Arc<UdpSocket>,
    dispatcher: Arc<RequestDispatcher>,
    limiter: Option<Arc<Semaphore>>,
}

impl DNSServer {
    /// Binds the listening socket. With `max_in_flight` set, at most that many
    /// requests are handled at once and the receive loop waits for a free slot.
    pub async fn bind(
        addr: SocketAddr,
        dispatcher: RequestDispatcher,
        max_in_flight: Option<usize>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to address {addr}"))?;

        Ok(Self {
            socket: Arc::new(socket),
            dispatcher: Arc::new(dispatcher),
            limiter: max_in_flight.map(|n| Arc::new(Semaphore::new(n))),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .context("Failed to read local address")
    }

    /// Receive loop. Every datagram is handled on its own task; the loop never
    /// waits for a request to finish.
    pub async fn run(&self) -> Result<()> {
        info!(addr = %self.local_addr()?, "listening for DNS queries");

        let mut buf = [0u8; MAX_UDP_PAYLOAD];

        loop {
            let (size, source) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!(error = %e, "error receiving data");
                    continue;
                }
            };
            trace!(size, %source, data = ?&buf[..size], "received datagram");

            let permit = match &self.limiter {
                Some(limiter) => Some(
                    limiter
                        .clone()
                        .acquire_owned()
                        .await
                        .context("request limiter closed")?,
                ),
                None => None,
            };

            let data = Bytes::copy_from_slice(&buf[..size]);
            let socket = self.socket.clone();
            let dispatcher = self.dispatcher.clone();

            tokio::spawn(async move {
                let _permit = permit;
                if let Some(response) = dispatcher.handle(&data).await {
                    if let Err(e) = socket.send_to(&response, source).await {
                        warn!(client = %source, error = %e, "failed to send response");
                    }
                }
            });
        }
    }
}
