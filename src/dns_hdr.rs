/*
                                1  1  1  1  1  1
  0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                      ID                       |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                    QDCOUNT                    |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                    ANCOUNT                    |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                    NSCOUNT                    |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                    ARCOUNT                    |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
 */

use bytes::{BufMut, BytesMut};
use nom::{bits::complete::take, combinator::map, number::complete::be_u16, sequence::tuple};

use crate::error::{DnsError, Result};

pub const DNS_HDR_SIZE: usize = 12;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub z: u8,
    pub rcode: u8,
}

impl Flags {
    pub fn compress_u16(&self) -> u16 {
        let flags_h: u8 = (u8::from(self.qr) << 7)
            | ((self.opcode & 0x0F) << 3)
            | (u8::from(self.aa) << 2)
            | (u8::from(self.tc) << 1)
            | u8::from(self.rd);
        let flags_l: u8 = (u8::from(self.ra) << 7) | ((self.z & 0x07) << 4) | (self.rcode & 0x0F);

        (flags_h as u16) << 8 | (flags_l as u16)
    }

    fn parse_flags(input: (&[u8], usize)) -> nom::IResult<(&[u8], usize), Flags> {
        map(
            tuple((
                take(1u8),
                take(4u8),
                take(1u8),
                take(1u8),
                take(1u8),
                take(1u8),
                take(3u8),
                take(4u8),
            )),
            |(qr, opcode, aa, tc, rd, ra, z, rcode): (u8, u8, u8, u8, u8, u8, u8, u8)| Flags {
                qr: qr == 1,
                opcode,
                aa: aa == 1,
                tc: tc == 1,
                rd: rd == 1,
                ra: ra == 1,
                z,
                rcode,
            },
        )(input)
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum OpCode {
    QUERY = 0,
    IQUERY = 1,
    STATUS = 2,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum RCode {
    OK = 0,
    FmtError = 1,
    ServerFailure = 2,
    NameError = 3,
    NotImplemented = 4,
    Refused = 5,
}

/// The fixed 12-byte message header.
///
/// The count fields are serialized as given; whoever builds a message is
/// responsible for keeping them equal to the sections that follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub flags: Flags,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl Header {
    /// Header of a single-question query sent towards the upstream resolver.
    /// Only the opcode and recursion-desired bit survive from `original`.
    pub fn upstream_query(id: u16, original: &Header) -> Self {
        Header {
            id,
            flags: Flags {
                opcode: original.flags.opcode,
                rd: original.flags.rd,
                ..Flags::default()
            },
            qdcount: 1,
            ..Header::default()
        }
    }

    /// Header of a response to `original` with the given section counts.
    pub fn response_to(original: &Header, rcode: RCode, qdcount: u16, ancount: u16) -> Self {
        Header {
            id: original.id,
            flags: Flags {
                qr: true,
                opcode: original.flags.opcode,
                rd: original.flags.rd,
                rcode: rcode as u8,
                ..Flags::default()
            },
            qdcount,
            ancount,
            nscount: 0,
            arcount: 0,
        }
    }

    pub fn is_standard_query(&self) -> bool {
        self.flags.opcode == OpCode::QUERY as u8
    }

    pub fn to_bytes(&self, buf: &mut BytesMut) {
        buf.reserve(DNS_HDR_SIZE);
        buf.put_u16(self.id);
        buf.put_u16(self.flags.compress_u16());
        buf.put_u16(self.qdcount);
        buf.put_u16(self.ancount);
        buf.put_u16(self.nscount);
        buf.put_u16(self.arcount);
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < DNS_HDR_SIZE {
            return Err(DnsError::TooShort {
                expected: DNS_HDR_SIZE,
                actual: buf.len(),
            });
        }

        let (_, header) = Self::parse(buf).map_err(|_| DnsError::TooShort {
            expected: DNS_HDR_SIZE,
            actual: buf.len(),
        })?;

        Ok(header)
    }

    fn parse(buf: &[u8]) -> nom::IResult<&[u8], Self> {
        map(
            tuple((
                be_u16,
                nom::bits::bits(Flags::parse_flags),
                be_u16,
                be_u16,
                be_u16,
                be_u16,
            )),
            |(id, flags, qdcount, ancount, nscount, arcount)| Header {
                id,
                flags,
                qdcount,
                ancount,
                nscount,
                arcount,
            },
        )(buf)
    }
}

/// Overwrites the transaction id of an encoded message in place.
pub fn patch_id(message: &mut [u8], id: u16) {
    if message.len() >= 2 {
        message[..2].copy_from_slice(&id.to_be_bytes());
    }
}
