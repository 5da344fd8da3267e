use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use dns_relay::config::Args;
use dns_relay::logging::init_tracing;
use dns_relay::{DNSServer, Forwarder, RequestDispatcher, UdpUpstream};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_config());

    let config = args.into_config();
    let upstream = UdpUpstream::new(config.resolve_upstream().await?, config.timeout);
    info!(
        resolver = %upstream.addr(),
        timeout_ms = config.timeout.as_millis() as u64,
        max_in_flight = ?config.max_in_flight,
        "forwarding queries"
    );

    let dispatcher = RequestDispatcher::new(Forwarder::new(Arc::new(upstream)));
    let server = DNSServer::bind(config.bind, dispatcher, config.max_in_flight).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }

    Ok(())
}
