//! Domain names: length-prefixed labels on the wire, dot-joined text in logs.
//!
//! Decoding understands compression pointers; encoding always writes the
//! full, uncompressed form.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::config::MAX_POINTER_JUMPS;
use crate::error::{DnsError, Result};

pub const MAX_LABEL_LEN: usize = 63;

const POINTER_MASK: u8 = 0b1100_0000;

/// A domain name as an ordered list of raw labels. The root name has no labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Name {
    labels: Vec<Bytes>,
}

impl Name {
    /// Splits a dotted name into labels. Empty segments (a trailing dot, or the
    /// empty string for the root) produce no label.
    pub fn from_dotted(name: &str) -> Self {
        Name {
            labels: name
                .split('.')
                .filter(|l| !l.is_empty())
                .map(|l| Bytes::copy_from_slice(l.as_bytes()))
                .collect(),
        }
    }

    pub fn labels(&self) -> &[Bytes] {
        &self.labels
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn to_bytes(&self, buf: &mut BytesMut) {
        for label in &self.labels {
            debug_assert!(label.len() <= MAX_LABEL_LEN);
            buf.put_u8(label.len() as u8);
            buf.extend_from_slice(label);
        }
        buf.put_u8(0);
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, label) in self.labels.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&String::from_utf8_lossy(label))?;
        }
        Ok(())
    }
}

impl From<&str> for Name {
    fn from(name: &str) -> Self {
        Name::from_dotted(name)
    }
}

pub fn encode_name(name: &Name) -> Bytes {
    let wire_len = name.labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1;
    let mut buf = BytesMut::with_capacity(wire_len);
    name.to_bytes(&mut buf);
    buf.freeze()
}

/// Decodes the name starting at `offset` in `message`.
///
/// Returns the name and the offset of the first byte after it. When the name
/// ends in a compression pointer, that offset is just past the first pointer
/// in the original location, not inside the region it points to.
pub fn decode_name(message: &[u8], offset: usize) -> Result<(Name, usize)> {
    let mut labels = Vec::new();
    let mut pos = offset;
    let mut jumps = 0;
    let mut next_offset = None;

    loop {
        let len = *message
            .get(pos)
            .ok_or(DnsError::TruncatedMessage { offset: pos })?;

        if len & POINTER_MASK == POINTER_MASK {
            let low = *message
                .get(pos + 1)
                .ok_or(DnsError::TruncatedMessage { offset: pos + 1 })?;

            if jumps == MAX_POINTER_JUMPS {
                return Err(DnsError::TooManyPointerJumps {
                    max: MAX_POINTER_JUMPS,
                });
            }
            jumps += 1;

            next_offset.get_or_insert(pos + 2);
            pos = (((len & !POINTER_MASK) as usize) << 8) | low as usize;
            continue;
        }

        if len == 0 {
            pos += 1;
            break;
        }

        if len as usize > MAX_LABEL_LEN {
            return Err(DnsError::InvalidLabelLength {
                length: len,
                offset: pos,
            });
        }

        let start = pos + 1;
        let end = start + len as usize;
        let label = message
            .get(start..end)
            .ok_or(DnsError::TruncatedMessage { offset: start })?;
        labels.push(Bytes::copy_from_slice(label));
        pos = end;
    }

    Ok((Name { labels }, next_offset.unwrap_or(pos)))
}
