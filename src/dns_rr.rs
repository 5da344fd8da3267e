use std::fmt;
use std::net::Ipv4Addr;

use bytes::{BufMut, Bytes, BytesMut};
use nom::{
    number::complete::{be_u16, be_u32},
    sequence::tuple,
};

use crate::dns_name::{decode_name, Name};
use crate::error::{DnsError, Result};

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum RRType {
    A = 1,      // Host Address
    NS = 2,     //an authoritative name server
    MD = 3,     //a mail destination (Obsolete - use MX)
    MF = 4,     //a mail forwarder (Obsolete - use MX)
    CNAME = 5,  //the canonical name for an alias
    SOA = 6,    //marks the start of a zone of authority
    MB = 7,     //a mailbox domain name (EXPERIMENTAL)
    MG = 8,     //a mail group member (EXPERIMENTAL)
    MR = 9,     //a mail rename domain name (EXPERIMENTAL)
    NULL = 10,  // a null RR (EXPERIMENTAL)
    WKS = 11,   // a well known service description
    PTR = 12,   // a domain name pointer
    HINFO = 13, // host information
    MINFO = 14, // mailbox or mail list information
    MX = 15,    // mail exchange
    TXT = 16,   // text strings
}

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum RRClass {
    IN = 1, // the Internet
    CS = 2, // the CSNET class (Obsolete - used only for examples in some obsolete RFCs)
    CH = 3, // the CHAOS class
    HS = 4, // Hesiod [Dyer 87]
}

/*
1  1  1  1  1  1
0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                                               |
/                     QNAME                     /
/                                               /
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                     QTYPE                     |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                     QCLASS                    |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: Name,
    pub qtype: u16,
    pub qclass: u16,
}

impl Question {
    pub fn new(name: impl Into<Name>, qtype: RRType, qclass: RRClass) -> Self {
        Question {
            name: name.into(),
            qtype: qtype as u16,
            qclass: qclass as u16,
        }
    }

    /// Decodes the question at `offset`, returning it with the offset of the
    /// next section.
    pub fn decode(message: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (name, offset) = decode_name(message, offset)?;

        let (_, (qtype, qclass)) = tuple((be_u16, be_u16))(&message[offset..]).map_err(
            |_: nom::Err<nom::error::Error<&[u8]>>| DnsError::InsufficientData {
                section: "question",
                offset,
            },
        )?;

        Ok((
            Question {
                name,
                qtype,
                qclass,
            },
            offset + 4,
        ))
    }

    pub fn to_bytes(&self, buf: &mut BytesMut) {
        self.name.to_bytes(buf);
        buf.put_u16(self.qtype);
        buf.put_u16(self.qclass);
    }

    pub fn domain(&self) -> String {
        self.name.to_string()
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.qtype, self.qclass)
    }
}

/// Decodes up to `count` consecutive questions starting at `offset`.
///
/// Stops at the first question that fails to decode; the ones before it are
/// kept. Returns the questions, the offset after the last good one, and the
/// error that stopped decoding, if any.
pub fn decode_questions(
    message: &[u8],
    offset: usize,
    count: u16,
) -> (Vec<Question>, usize, Option<DnsError>) {
    let mut questions = Vec::with_capacity(count as usize);
    let mut offset = offset;

    for _ in 0..count {
        match Question::decode(message, offset) {
            Ok((question, next)) => {
                questions.push(question);
                offset = next;
            }
            Err(e) => return (questions, offset, Some(e)),
        }
    }

    (questions, offset, None)
}

/*
0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                                               |
/                                               /
/                      NAME                     /
|                                               |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                      TYPE                     |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                     CLASS                     |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                      TTL                      |
|                                               |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                   RDLENGTH                    |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--|
/                     RDATA                     /
/                                               /
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub name: Name,
    pub rtype: u16,
    pub rclass: u16,
    pub ttl: u32,
    pub rdata: Bytes,
}

impl Answer {
    pub fn new(
        name: impl Into<Name>,
        rtype: RRType,
        rclass: RRClass,
        ttl: u32,
        rdata: Bytes,
    ) -> Self {
        Answer {
            name: name.into(),
            rtype: rtype as u16,
            rclass: rclass as u16,
            ttl,
            rdata,
        }
    }

    pub fn a_record(name: impl Into<Name>, addr: Ipv4Addr, ttl: u32) -> Self {
        Answer::new(
            name,
            RRType::A,
            RRClass::IN,
            ttl,
            Bytes::copy_from_slice(&addr.octets()),
        )
    }

    /// Decodes the record at `offset`. The rdata is copied verbatim; names
    /// embedded inside it are not decompressed.
    pub fn decode(message: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (name, offset) = decode_name(message, offset)?;

        let (_, (rtype, rclass, ttl, rdlength)) =
            tuple((be_u16, be_u16, be_u32, be_u16))(&message[offset..]).map_err(
                |_: nom::Err<nom::error::Error<&[u8]>>| DnsError::InsufficientData {
                    section: "resource record",
                    offset,
                },
            )?;

        let start = offset + 10;
        let end = start + rdlength as usize;
        let rdata = message
            .get(start..end)
            .ok_or(DnsError::TruncatedMessage { offset: start })?;

        Ok((
            Answer {
                name,
                rtype,
                rclass,
                ttl,
                rdata: Bytes::copy_from_slice(rdata),
            },
            end,
        ))
    }

    pub fn to_bytes(&self, buf: &mut BytesMut) {
        debug_assert!(self.rdata.len() <= u16::MAX as usize);

        self.name.to_bytes(buf);
        buf.put_u16(self.rtype);
        buf.put_u16(self.rclass);
        buf.put_u32(self.ttl);
        buf.put_u16(self.rdata.len() as u16);
        buf.extend_from_slice(&self.rdata);
    }
}
