use bytes::Bytes;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::dns_hdr::{Header, RCode, DNS_HDR_SIZE};
use crate::dns_rr::decode_questions;
use crate::forwarder::Forwarder;
use crate::merger::{build_response, merge};

/// Turns one inbound datagram into at most one outbound datagram.
pub struct RequestDispatcher {
    forwarder: Forwarder,
}

impl RequestDispatcher {
    pub fn new(forwarder: Forwarder) -> Self {
        Self { forwarder }
    }

    /// Handles a raw query, returning the response to send back, if any.
    ///
    /// `None` means the datagram is dropped silently: the header could not be
    /// decoded, no question could be parsed, or every upstream exchange failed.
    pub async fn handle(&self, datagram: &[u8]) -> Option<Bytes> {
        let header = match Header::from_bytes(datagram) {
            Ok(header) => header,
            Err(e) => {
                warn!(error = %e, "dropping malformed query");
                return None;
            }
        };

        let (questions, _, err) = decode_questions(datagram, DNS_HDR_SIZE, header.qdcount);
        if let Some(e) = err {
            warn!(
                id = header.id,
                parsed = questions.len(),
                qdcount = header.qdcount,
                error = %e,
                "ignoring remaining questions"
            );
        }

        if !header.is_standard_query() {
            debug!(id = header.id, opcode = header.flags.opcode, "opcode not implemented");
            return Some(build_response(
                &header,
                RCode::NotImplemented,
                &questions,
                &[],
            ));
        }

        if questions.is_empty() {
            debug!(id = header.id, "no questions in query");
            return None;
        }

        debug!(
            id = header.id,
            questions = ?questions.iter().map(|q| q.to_string()).collect::<Vec<_>>(),
            "received query"
        );

        let results = join_all(
            questions
                .iter()
                .map(|q| self.forwarder.forward(q, &header)),
        )
        .await;

        let replies: Vec<Bytes> = questions
            .iter()
            .zip(results)
            .filter_map(|(q, result)| match result {
                Ok(reply) => Some(reply),
                Err(e) => {
                    warn!(id = header.id, question = %q, error = %e, "error forwarding query");
                    None
                }
            })
            .collect();

        if replies.is_empty() {
            warn!(id = header.id, "no upstream replies, dropping query");
            return None;
        }

        Some(merge(&header, &replies))
    }
}
