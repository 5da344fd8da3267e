//! Recombines per-question upstream replies into the client's response.

use bytes::{Bytes, BytesMut};
use tracing::warn;

use crate::config::MAX_UDP_PAYLOAD;
use crate::dns_hdr::{patch_id, Header, RCode, DNS_HDR_SIZE};
use crate::dns_rr::{Answer, Question};
use crate::error::Result;

/// Builds the client-facing response from the upstream replies, in the order
/// their questions appeared in the client query.
///
/// A single reply is passed through with only its id rewritten. Several
/// replies are decoded and their question and answer sections concatenated
/// under a fresh header. Callers never pass an empty `replies`.
pub fn merge(original: &Header, replies: &[Bytes]) -> Bytes {
    if let [reply] = replies {
        let mut response = BytesMut::from(&reply[..]);
        patch_id(&mut response, original.id);
        return response.freeze();
    }

    let mut questions = Vec::new();
    let mut answers = Vec::new();

    for (i, reply) in replies.iter().enumerate() {
        if let Err(e) = collect_sections(reply, &mut questions, &mut answers) {
            warn!(reply = i, error = %e, "skipping rest of malformed upstream reply");
        }
    }

    build_response(original, RCode::OK, &questions, &answers)
}

/// Appends the question and answer sections of `reply` to the accumulators,
/// stopping at the first section that fails to decode.
fn collect_sections(
    reply: &[u8],
    questions: &mut Vec<Question>,
    answers: &mut Vec<Answer>,
) -> Result<()> {
    let header = Header::from_bytes(reply)?;
    let mut offset = DNS_HDR_SIZE;

    for _ in 0..header.qdcount {
        let (question, next) = Question::decode(reply, offset)?;
        questions.push(question);
        offset = next;
    }

    for _ in 0..header.ancount {
        let (answer, next) = Answer::decode(reply, offset)?;
        answers.push(answer);
        offset = next;
    }

    Ok(())
}

/// Encodes a response to `original` carrying exactly the given sections.
pub fn build_response(
    original: &Header,
    rcode: RCode,
    questions: &[Question],
    answers: &[Answer],
) -> Bytes {
    let questions = &questions[..questions.len().min(u16::MAX as usize)];
    let answers = &answers[..answers.len().min(u16::MAX as usize)];

    let header = Header::response_to(
        original,
        rcode,
        questions.len() as u16,
        answers.len() as u16,
    );

    let mut buf = BytesMut::with_capacity(MAX_UDP_PAYLOAD);
    header.to_bytes(&mut buf);
    for q in questions {
        q.to_bytes(&mut buf);
    }
    for a in answers {
        a.to_bytes(&mut buf);
    }

    buf.freeze()
}
