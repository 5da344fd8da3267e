use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bytes::{Bytes, BytesMut};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::time::timeout;

use dns_relay::dns_hdr::{Flags, Header, DNS_HDR_SIZE};
use dns_relay::dns_rr::{decode_questions, Answer, Question, RRClass, RRType};
use dns_relay::{DNSServer, Forwarder, RequestDispatcher, UdpUpstream};

/// Upstream resolver stand-in. Answers every single-question A query with
/// 10.0.0.<label count>, except names starting with `silent`, which it
/// ignores. Multi-question queries are refused with FORMERR.
struct MockResolver {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockResolver {
    async fn start() -> Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = socket.local_addr()?;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 512];
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = socket.recv_from(&mut buf) => {
                        if let Ok((len, peer)) = result {
                            if let Some(reply) = Self::reply(&buf[..len]) {
                                let _ = socket.send_to(&reply, peer).await;
                            }
                        }
                    }
                }
            }
        });

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    fn reply(query: &[u8]) -> Option<Bytes> {
        let header = Header::from_bytes(query).ok()?;
        let mut buf = BytesMut::new();

        if header.qdcount != 1 {
            Header {
                id: header.id,
                flags: Flags {
                    qr: true,
                    rcode: 1,
                    ..Flags::default()
                },
                ..Header::default()
            }
            .to_bytes(&mut buf);
            return Some(buf.freeze());
        }

        let (question, end) = Question::decode(query, DNS_HDR_SIZE).ok()?;
        if question.domain().starts_with("silent") {
            return None;
        }

        Header {
            id: header.id,
            flags: Flags {
                qr: true,
                ra: true,
                rd: header.flags.rd,
                ..Flags::default()
            },
            qdcount: 1,
            ancount: 1,
            ..Header::default()
        }
        .to_bytes(&mut buf);
        buf.extend_from_slice(&query[DNS_HDR_SIZE..end]);
        // answer name compressed against the question
        buf.extend_from_slice(&[0xC0, 0x0C, 0, 1, 0, 1, 0, 0, 0, 60, 0, 4]);
        buf.extend_from_slice(&[10, 0, 0, question.name.labels().len() as u8]);
        Some(buf.freeze())
    }
}

impl Drop for MockResolver {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn start_relay(resolver: SocketAddr) -> Result<SocketAddr> {
    let upstream = UdpUpstream::new(resolver, Duration::from_millis(300));
    let dispatcher = RequestDispatcher::new(Forwarder::new(Arc::new(upstream)));
    let server = DNSServer::bind("127.0.0.1:0".parse()?, dispatcher, Some(16)).await?;
    let addr = server.local_addr()?;
    tokio::spawn(async move { server.run().await });
    Ok(addr)
}

fn build_query(id: u16, names: &[&str]) -> Bytes {
    let mut buf = BytesMut::new();
    Header {
        id,
        flags: Flags {
            rd: true,
            ..Flags::default()
        },
        qdcount: names.len() as u16,
        ..Header::default()
    }
    .to_bytes(&mut buf);
    for name in names {
        Question::new(*name, RRType::A, RRClass::IN).to_bytes(&mut buf);
    }
    buf.freeze()
}

async fn exchange(relay: SocketAddr, query: &[u8]) -> Result<Option<Vec<u8>>> {
    let client = UdpSocket::bind("127.0.0.1:0").await?;
    client.send_to(query, relay).await?;

    let mut buf = vec![0u8; 512];
    match timeout(Duration::from_secs(1), client.recv_from(&mut buf)).await {
        Ok(received) => {
            let (len, _) = received?;
            buf.truncate(len);
            Ok(Some(buf))
        }
        Err(_) => Ok(None),
    }
}

fn parse_response(response: &[u8]) -> Result<(Header, Vec<Question>, Vec<Answer>)> {
    let header = Header::from_bytes(response)?;
    let (questions, mut offset, err) = decode_questions(response, DNS_HDR_SIZE, header.qdcount);
    assert!(err.is_none(), "bad question section: {err:?}");

    let mut answers = Vec::new();
    for _ in 0..header.ancount {
        let (answer, next) = Answer::decode(response, offset)?;
        answers.push(answer);
        offset = next;
    }
    Ok((header, questions, answers))
}

#[tokio::test]
async fn test_single_question_keeps_client_id() -> Result<()> {
    let resolver = MockResolver::start().await?;
    let relay = start_relay(resolver.addr).await?;

    let response = exchange(relay, &build_query(0xABCD, &["example.com"]))
        .await?
        .expect("relay should answer");
    let (header, questions, answers) = parse_response(&response)?;

    assert_eq!(header.id, 0xABCD);
    assert!(header.flags.qr);
    assert_eq!(header.qdcount, 1);
    assert_eq!(header.ancount, 1);
    assert_eq!(questions[0].domain(), "example.com");
    assert_eq!(answers[0].name.to_string(), "example.com");
    assert_eq!(&answers[0].rdata[..], &[10, 0, 0, 2]);
    Ok(())
}

#[tokio::test]
async fn test_multi_question_query_is_split_and_merged() -> Result<()> {
    let resolver = MockResolver::start().await?;
    let relay = start_relay(resolver.addr).await?;

    let query = build_query(0x1234, &["abc.longassdomainname.com", "def.com"]);
    let response = exchange(relay, &query).await?.expect("relay should answer");
    let (header, questions, answers) = parse_response(&response)?;

    assert_eq!(header.id, 0x1234);
    assert_eq!(header.flags.rcode, 0);
    assert_eq!((header.qdcount, header.ancount), (2, 2));
    assert_eq!(questions[0].domain(), "abc.longassdomainname.com");
    assert_eq!(questions[1].domain(), "def.com");
    assert_eq!(answers[0].name.to_string(), "abc.longassdomainname.com");
    assert_eq!(&answers[0].rdata[..], &[10, 0, 0, 3]);
    assert_eq!(answers[1].name.to_string(), "def.com");
    assert_eq!(&answers[1].rdata[..], &[10, 0, 0, 2]);
    Ok(())
}

#[tokio::test]
async fn test_unanswered_question_is_left_out() -> Result<()> {
    let resolver = MockResolver::start().await?;
    let relay = start_relay(resolver.addr).await?;

    let query = build_query(42, &["a.example", "silent.example", "b.c.example"]);
    let response = exchange(relay, &query).await?.expect("relay should answer");
    let (header, questions, answers) = parse_response(&response)?;

    assert_eq!(header.id, 42);
    assert_eq!((header.qdcount, header.ancount), (2, 2));
    assert_eq!(questions[0].domain(), "a.example");
    assert_eq!(questions[1].domain(), "b.c.example");
    assert_eq!(&answers[1].rdata[..], &[10, 0, 0, 3]);
    Ok(())
}

#[tokio::test]
async fn test_no_reply_when_everything_fails() -> Result<()> {
    let resolver = MockResolver::start().await?;
    let relay = start_relay(resolver.addr).await?;

    let query = build_query(7, &["silent.one", "silent.two"]);
    assert!(exchange(relay, &query).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_malformed_datagram_is_ignored() -> Result<()> {
    let resolver = MockResolver::start().await?;
    let relay = start_relay(resolver.addr).await?;

    assert!(exchange(relay, &[0xAB, 0xCD, 0x01]).await?.is_none());

    // the relay keeps serving afterwards
    let response = exchange(relay, &build_query(1, &["x.y"])).await?;
    assert!(response.is_some());
    Ok(())
}
