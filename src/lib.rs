//! UDP DNS relay.
//!
//! Many resolvers refuse queries carrying more than one question. The relay
//! splits such a query into one upstream query per question and merges the
//! replies back into a single response for the client.

pub mod config;
pub mod dispatcher;
pub mod dns_hdr;
pub mod dns_name;
pub mod dns_rr;
pub mod dns_server;
pub mod error;
pub mod forwarder;
pub mod logging;
pub mod merger;

pub use dispatcher::RequestDispatcher;
pub use dns_server::DNSServer;
pub use error::{DnsError, Result};
pub use forwarder::{Forwarder, UdpUpstream, Upstream};
