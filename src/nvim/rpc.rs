//! Blocking msgpack-RPC client for the editor socket.
//!
//! Requests go out as `[0, msgid, method, [arg]]` and replies come back as
//! `[1, msgid, error, result]`. The editor is driven through exactly two
//! methods, `nvim_command` and `nvim_eval`, and every expression this tool
//! evaluates yields an integer, so both directions decode into plain typed
//! tuples.

use std::fmt;
use std::io::{BufReader, Read, Write};
use std::net::TcpStream;
use std::os::unix::net::UnixStream;

use serde::Deserialize;
use serde::de::{self, IgnoredAny, SeqAccess, Visitor};

use crate::error::{Error, Result};

/// Synchronous RPC connection with one request in flight at a time.
pub struct RpcClient {
    reader: BufReader<Box<dyn Read + Send>>,
    writer: Box<dyn Write + Send>,
    next_msgid: u64,
}

impl RpcClient {
    /// Connects to the editor's RPC socket. Addresses containing a colon
    /// are dialed as `host:port` over TCP, anything else as a unix socket
    /// path.
    pub fn connect(address: &str) -> Result<RpcClient> {
        if address.contains(':') {
            let stream = TcpStream::connect(address)?;
            let reader = stream.try_clone()?;
            Ok(RpcClient::from_parts(Box::new(reader), Box::new(stream)))
        } else {
            let stream = UnixStream::connect(address)?;
            let reader = stream.try_clone()?;
            Ok(RpcClient::from_parts(Box::new(reader), Box::new(stream)))
        }
    }

    fn from_parts(reader: Box<dyn Read + Send>, writer: Box<dyn Write + Send>) -> RpcClient {
        RpcClient {
            reader: BufReader::new(reader),
            writer,
            next_msgid: 1,
        }
    }

    /// Calls a method whose result we do not look at.
    pub fn call(&mut self, method: &str, arg: &str) -> Result<()> {
        self.request(method, arg).map(|_| ())
    }

    /// Calls a method that must return an integer.
    pub fn call_int(&mut self, method: &str, arg: &str) -> Result<i64> {
        self.request(method, arg)?
            .ok_or_else(|| Error::RpcProtocol(format!("{method} returned no integer")))
    }

    fn request(&mut self, method: &str, arg: &str) -> Result<Option<i64>> {
        let msgid = self.next_msgid;
        self.next_msgid += 1;

        let frame = rmp_serde::to_vec(&(0u8, msgid, method, (arg,)))?;
        self.writer.write_all(&frame)?;
        self.writer.flush()?;

        self.read_reply(msgid)
    }

    fn read_reply(&mut self, want: u64) -> Result<Option<i64>> {
        loop {
            let mut de = rmp_serde::Deserializer::new(&mut self.reader);
            match Incoming::deserialize(&mut de)? {
                Incoming::Notification => continue,
                Incoming::Reply {
                    msgid,
                    error,
                    result,
                } => {
                    if msgid != want {
                        return Err(Error::RpcProtocol(format!(
                            "reply for request {msgid}, expected {want}"
                        )));
                    }
                    if let Some((code, message)) = error {
                        return Err(Error::Editor { code, message });
                    }
                    return Ok(result);
                }
            }
        }
    }
}

/// One message from the editor. Broadcast notifications (`[2, method,
/// params]`) are decoded only far enough to be skipped.
#[derive(Debug)]
enum Incoming {
    Reply {
        msgid: u64,
        error: Option<(i64, String)>,
        result: Option<i64>,
    },
    Notification,
}

impl<'de> Deserialize<'de> for Incoming {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        struct MessageVisitor;

        impl<'de> Visitor<'de> for MessageVisitor {
            type Value = Incoming;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a msgpack-rpc message array")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Incoming, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let missing = || de::Error::custom("truncated msgpack-rpc message");
                let kind: u8 = seq.next_element()?.ok_or_else(missing)?;
                match kind {
                    1 => {
                        let msgid: u64 = seq.next_element()?.ok_or_else(missing)?;
                        let error: Option<(i64, String)> =
                            seq.next_element()?.ok_or_else(missing)?;
                        let result: Option<i64> = seq.next_element()?.ok_or_else(missing)?;
                        Ok(Incoming::Reply {
                            msgid,
                            error,
                            result,
                        })
                    }
                    2 => {
                        let _ = seq.next_element::<IgnoredAny>()?.ok_or_else(missing)?;
                        let _ = seq.next_element::<IgnoredAny>()?.ok_or_else(missing)?;
                        Ok(Incoming::Notification)
                    }
                    other => Err(de::Error::custom(format!(
                        "unsupported msgpack-rpc message type {other}"
                    ))),
                }
            }
        }

        deserializer.deserialize_seq(MessageVisitor)
    }
}
