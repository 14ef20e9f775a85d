//! NATS text protocol over TCP.
//!
//! Supports the subset the agent needs: `CONNECT`, `PUB`, `SUB`, `UNSUB`,
//! `MSG`, `PING`/`PONG`. Headers, TLS and auth are not negotiated.

use crate::bus::{validate_subject, Message, MessageBus, Subscription};
use crate::error::BusError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const DEFAULT_PORT: u16 = 4222;

type Writer = Arc<tokio::sync::Mutex<BufWriter<OwnedWriteHalf>>>;
type Subscribers = Arc<Mutex<HashMap<u64, mpsc::UnboundedSender<Message>>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct MsgHeader {
    subject: String,
    sid: u64,
    reply: Option<String>,
    size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ServerOp {
    Info(String),
    Msg(MsgHeader),
    Ping,
    Pong,
    Ok,
    Err(String),
}

fn protocol_error(reason: impl Into<String>) -> BusError {
    BusError::Protocol {
        reason: reason.into(),
    }
}

fn parse_server_op(line: &str) -> Result<ServerOp, BusError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (op, rest) = match line.split_once(' ') {
        Some((op, rest)) => (op, rest.trim()),
        None => (line, ""),
    };

    match op.to_ascii_uppercase().as_str() {
        "INFO" => Ok(ServerOp::Info(rest.to_string())),
        "PING" => Ok(ServerOp::Ping),
        "PONG" => Ok(ServerOp::Pong),
        "+OK" => Ok(ServerOp::Ok),
        "-ERR" => Ok(ServerOp::Err(rest.trim_matches('\'').to_string())),
        "MSG" => {
            let args: Vec<&str> = rest.split_whitespace().collect();
            let (subject, sid, reply, size) = match args.as_slice() {
                [subject, sid, size] => (*subject, *sid, None, *size),
                [subject, sid, reply, size] => (*subject, *sid, Some(*reply), *size),
                _ => return Err(protocol_error(format!("malformed MSG line: {line:?}"))),
            };
            Ok(ServerOp::Msg(MsgHeader {
                subject: subject.to_string(),
                sid: sid
                    .parse()
                    .map_err(|_| protocol_error(format!("bad sid in {line:?}")))?,
                reply: reply.map(str::to_string),
                size: size
                    .parse()
                    .map_err(|_| protocol_error(format!("bad size in {line:?}")))?,
            }))
        }
        _ => Err(protocol_error(format!("unexpected server operation: {line:?}"))),
    }
}

/// `nats://host:port` (or a bare `host:port`) to a socket address string.
fn parse_nats_url(url: &str) -> Result<String, BusError> {
    let invalid = || BusError::InvalidUrl {
        url: url.to_string(),
    };
    let without_scheme = match url.split_once("://") {
        Some(("nats" | "tcp", rest)) => rest,
        Some(_) => return Err(invalid()),
        None => url,
    };
    let authority = without_scheme.trim_end_matches('/');
    // Credentials are not supported; drop them rather than dial "user@host".
    let host_port = authority.rsplit('@').next().unwrap_or(authority);
    if host_port.is_empty() || host_port.contains('/') {
        return Err(invalid());
    }

    if host_port.starts_with('[') {
        // IPv6 literal, port after the closing bracket.
        return match host_port.rsplit_once("]:") {
            Some((_, port)) if port.parse::<u16>().is_ok() => Ok(host_port.to_string()),
            Some(_) => Err(invalid()),
            None => Ok(format!("{host_port}:{DEFAULT_PORT}")),
        };
    }
    match host_port.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(host_port.to_string())
        }
        Some(_) => Err(invalid()),
        None => Ok(format!("{host_port}:{DEFAULT_PORT}")),
    }
}

/// Client connection to a NATS server.
pub struct NatsBus {
    server: String,
    writer: Writer,
    subscribers: Subscribers,
    next_sid: AtomicU64,
    reader: JoinHandle<()>,
}

impl fmt::Debug for NatsBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NatsBus")
            .field("server", &self.server)
            .field("subscriptions", &self.subscribers.lock().len())
            .finish()
    }
}

impl NatsBus {
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let server = parse_nats_url(url)?;
        let stream = TcpStream::connect(&server).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(BusError::Closed);
        }
        match parse_server_op(&line)? {
            ServerOp::Info(_) => {}
            other => return Err(protocol_error(format!("expected INFO, got {other:?}"))),
        }

        let connect = json!({
            "verbose": false,
            "pedantic": false,
            "name": "lookout",
            "lang": "rust",
            "version": lookout_core::VERSION,
            "protocol": 0,
        });
        let mut writer = BufWriter::new(write_half);
        writer
            .write_all(format!("CONNECT {connect}\r\nPING\r\n").as_bytes())
            .await?;
        writer.flush().await?;

        let writer: Writer = Arc::new(tokio::sync::Mutex::new(writer));
        let subscribers: Subscribers = Arc::new(Mutex::new(HashMap::new()));
        let reader = tokio::spawn(read_loop(
            reader,
            Arc::clone(&writer),
            Arc::clone(&subscribers),
        ));

        info!(%server, "Connected to NATS");
        Ok(Self {
            server,
            writer,
            subscribers,
            next_sid: AtomicU64::new(1),
            reader,
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    async fn send(&self, frame: &[u8]) -> Result<(), BusError> {
        if self.reader.is_finished() {
            return Err(BusError::Closed);
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(frame).await?;
        writer.flush().await?;
        Ok(())
    }
}

impl Drop for NatsBus {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    async fn publish_with_reply(
        &self,
        subject: &str,
        reply: Option<&str>,
        payload: Vec<u8>,
    ) -> Result<(), BusError> {
        validate_subject(subject)?;
        let mut frame = match reply {
            Some(reply) => {
                validate_subject(reply)?;
                format!("PUB {subject} {reply} {}\r\n", payload.len())
            }
            None => format!("PUB {subject} {}\r\n", payload.len()),
        }
        .into_bytes();
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(b"\r\n");
        self.send(&frame).await
    }

    async fn subscribe(&self, subject: &str) -> Result<Subscription, BusError> {
        validate_subject(subject)?;
        let sid = self.next_sid.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().insert(sid, tx);

        if let Err(err) = self.send(format!("SUB {subject} {sid}\r\n").as_bytes()).await {
            self.subscribers.lock().remove(&sid);
            return Err(err);
        }
        debug!(subject, sid, "Subscribed");
        Ok(Subscription::new(subject, rx))
    }
}

async fn read_loop(mut reader: BufReader<OwnedReadHalf>, writer: Writer, subscribers: Subscribers) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "NATS read failed");
                break;
            }
        }

        let op = match parse_server_op(&line) {
            Ok(op) => op,
            Err(err) => {
                warn!(error = %err, "Dropping NATS connection");
                break;
            }
        };

        match op {
            ServerOp::Msg(header) => {
                // Payload plus its trailing CRLF.
                let mut payload = vec![0u8; header.size + 2];
                if let Err(err) = reader.read_exact(&mut payload).await {
                    warn!(error = %err, "NATS payload read failed");
                    break;
                }
                payload.truncate(header.size);
                deliver(&writer, &subscribers, header, payload).await;
            }
            ServerOp::Ping => {
                let mut writer = writer.lock().await;
                if writer.write_all(b"PONG\r\n").await.is_err() || writer.flush().await.is_err() {
                    break;
                }
            }
            ServerOp::Err(reason) => warn!(%reason, "NATS server error"),
            ServerOp::Info(_) | ServerOp::Pong | ServerOp::Ok => {}
        }
    }

    // Ends every open subscription.
    subscribers.lock().clear();
    info!("NATS connection closed");
}

async fn deliver(writer: &Writer, subscribers: &Subscribers, header: MsgHeader, payload: Vec<u8>) {
    let message = Message {
        subject: header.subject,
        reply: header.reply,
        payload,
    };

    let delivered = match subscribers.lock().get(&header.sid) {
        Some(tx) => tx.send(message).is_ok(),
        None => return,
    };
    if !delivered {
        subscribers.lock().remove(&header.sid);
        let mut writer = writer.lock().await;
        let _ = writer
            .write_all(format!("UNSUB {}\r\n", header.sid).as_bytes())
            .await;
        let _ = writer.flush().await;
        debug!(sid = header.sid, "Unsubscribed dropped subscription");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_msg_with_and_without_reply() {
        assert_eq!(
            parse_server_op("MSG policy_events 3 11\r\n").unwrap(),
            ServerOp::Msg(MsgHeader {
                subject: "policy_events".into(),
                sid: 3,
                reply: None,
                size: 11,
            })
        );
        assert_eq!(
            parse_server_op("MSG abc_policy_add 1 _INBOX.xyz 42\r\n").unwrap(),
            ServerOp::Msg(MsgHeader {
                subject: "abc_policy_add".into(),
                sid: 1,
                reply: Some("_INBOX.xyz".into()),
                size: 42,
            })
        );
    }

    #[test]
    fn test_parse_control_ops() {
        assert_eq!(parse_server_op("PING\r\n").unwrap(), ServerOp::Ping);
        assert_eq!(parse_server_op("pong\r\n").unwrap(), ServerOp::Pong);
        assert_eq!(parse_server_op("+OK\r\n").unwrap(), ServerOp::Ok);
        assert_eq!(
            parse_server_op("-ERR 'Unknown Protocol Operation'\r\n").unwrap(),
            ServerOp::Err("Unknown Protocol Operation".into())
        );
        assert!(matches!(
            parse_server_op("INFO {\"server_id\":\"x\"}\r\n").unwrap(),
            ServerOp::Info(_)
        ));
        assert!(parse_server_op("MSG only-subject\r\n").is_err());
        assert!(parse_server_op("HELLO\r\n").is_err());
    }

    #[test]
    fn test_parse_urls() {
        assert_eq!(parse_nats_url("nats://localhost:4222").unwrap(), "localhost:4222");
        assert_eq!(parse_nats_url("nats://10.0.0.5").unwrap(), "10.0.0.5:4222");
        assert_eq!(parse_nats_url("127.0.0.1:5222/").unwrap(), "127.0.0.1:5222");
        assert_eq!(parse_nats_url("nats://user:pw@bus:4223").unwrap(), "bus:4223");
        assert_eq!(parse_nats_url("nats://[::1]:4222").unwrap(), "[::1]:4222");
        assert!(parse_nats_url("http://localhost:4222").is_err());
        assert!(parse_nats_url("nats://host:notaport").is_err());
        assert!(parse_nats_url("").is_err());
    }

    /// Minimal scripted server: expects CONNECT, PING, SUB, then a PUB that
    /// it echoes back to the subscription.
    async fn echo_server(listener: TcpListener) {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        write_half
            .write_all(b"INFO {\"server_id\":\"test\"}\r\n")
            .await
            .unwrap();

        let mut sid = String::new();
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                return;
            }
            let fields: Vec<String> = line.split_whitespace().map(str::to_string).collect();
            match fields.first().map(String::as_str) {
                Some("PING") => write_half.write_all(b"PONG\r\n").await.unwrap(),
                Some("SUB") => sid = fields[2].clone(),
                Some("PUB") => {
                    let size: usize = fields.last().unwrap().parse().unwrap();
                    let mut payload = vec![0u8; size + 2];
                    reader.read_exact(&mut payload).await.unwrap();
                    let header = format!("MSG {} {} {}\r\n", fields[1], sid, size);
                    write_half.write_all(header.as_bytes()).await.unwrap();
                    write_half.write_all(&payload).await.unwrap();
                    write_half.write_all(b"PING\r\n").await.unwrap();
                }
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn test_publish_and_receive_through_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(echo_server(listener));

        let bus = NatsBus::connect(&format!("nats://{addr}")).await.unwrap();
        let mut subscription = bus.subscribe("policy_events").await.unwrap();
        bus.publish("policy_events", b"{\"ok\":true}".to_vec())
            .await
            .unwrap();

        let message = tokio::time::timeout(Duration::from_secs(2), subscription.next())
            .await
            .expect("echo should arrive")
            .expect("subscription should stay open");
        assert_eq!(message.subject, "policy_events");
        assert_eq!(message.payload, b"{\"ok\":true}");
        assert_eq!(message.reply, None);
    }

    #[tokio::test]
    async fn test_connect_requires_info() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"PONG\r\n").await.unwrap();
        });

        let result = NatsBus::connect(&addr.to_string()).await;
        assert!(matches!(result, Err(BusError::Protocol { .. })));
    }
}
