//! RESP Store Client
//!
//! A blocking client for a Redis-compatible server. One request is in
//! flight at a time: the command is written in full, then the reply is read
//! until the parser reports a complete frame.
//!
//! There is no timeout on either direction; a stalled store stalls the
//! worker that owns this connection.

use super::{FieldMap, StoreConnection, StoreError};
use crate::protocol::{parse_message, RespValue};
use bytes::{Buf, BytesMut};
use std::io::{self, Read, Write};
use std::net::TcpStream;
use tracing::{debug, trace};

const READ_CHUNK: usize = 4096;

/// A persistent connection to a Redis-compatible store.
#[derive(Debug)]
pub struct RespConnection {
    stream: TcpStream,
    addr: String,
    buffer: BytesMut,
}

impl RespConnection {
    /// Connects to `addr` (`host:port`).
    pub fn connect(addr: &str) -> Result<Self, StoreError> {
        let stream = TcpStream::connect(addr).map_err(|source| StoreError::Connect {
            addr: addr.to_string(),
            source,
        })?;
        stream.set_nodelay(true)?;

        debug!(store = %addr, "Store connection opened");

        Ok(Self {
            stream,
            addr: addr.to_string(),
            buffer: BytesMut::with_capacity(READ_CHUNK),
        })
    }

    /// Sends one command and waits for its reply. Error replies become
    /// [`StoreError::Server`].
    pub fn call(&mut self, command: RespValue) -> Result<RespValue, StoreError> {
        self.stream.write_all(&command.serialize())?;
        self.stream.flush()?;

        match self.read_reply()? {
            RespValue::Error(message) => Err(StoreError::Server(message)),
            reply => Ok(reply),
        }
    }

    fn read_reply(&mut self) -> Result<RespValue, StoreError> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some((reply, consumed)) = parse_message(&self.buffer)? {
                self.buffer.advance(consumed);
                trace!(store = %self.addr, kind = reply.kind(), consumed, "Parsed reply");
                return Ok(reply);
            }

            let n = self.stream.read(&mut chunk)?;
            if n == 0 {
                return Err(StoreError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "store closed the connection",
                )));
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    fn integer_reply(&mut self, name: &'static str, command: RespValue) -> Result<i64, StoreError> {
        let reply = self.call(command)?;
        reply.as_integer().ok_or_else(|| StoreError::UnexpectedReply {
            command: name,
            reply: reply.to_string(),
        })
    }
}

impl StoreConnection for RespConnection {
    fn upsert_fields(&mut self, key: &str, fields: &[(&str, &str)]) -> Result<(), StoreError> {
        let mut parts: Vec<&str> = Vec::with_capacity(2 + fields.len() * 2);
        parts.push("HSET");
        parts.push(key);
        for &(field, value) in fields {
            parts.push(field);
            parts.push(value);
        }

        self.integer_reply("HSET", RespValue::command(parts))?;
        Ok(())
    }

    fn get_all_fields(&mut self, key: &str) -> Result<Option<FieldMap>, StoreError> {
        let reply = self.call(RespValue::command(["HGETALL", key]))?;
        if reply.is_null() {
            return Ok(None);
        }
        let described = reply.to_string();
        let items = reply.into_array().ok_or(StoreError::UnexpectedReply {
            command: "HGETALL",
            reply: described.clone(),
        })?;

        if items.is_empty() {
            return Ok(None);
        }
        if items.len() % 2 != 0 {
            return Err(StoreError::UnexpectedReply {
                command: "HGETALL",
                reply: described,
            });
        }

        let mut fields = FieldMap::with_capacity(items.len() / 2);
        for pair in items.chunks(2) {
            match (pair[0].as_str(), pair[1].as_str()) {
                (Some(field), Some(value)) => {
                    fields.insert(field.to_string(), value.to_string());
                }
                _ => {
                    return Err(StoreError::UnexpectedReply {
                        command: "HGETALL",
                        reply: described,
                    })
                }
            }
        }

        Ok(Some(fields))
    }

    fn set_field(&mut self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.integer_reply("HSET", RespValue::command(["HSET", key, field, value]))?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<u64, StoreError> {
        let removed = self.integer_reply("DEL", RespValue::command(["DEL", key]))?;
        Ok(removed.max(0) as u64)
    }

    fn exists(&mut self, key: &str) -> Result<bool, StoreError> {
        Ok(self.integer_reply("EXISTS", RespValue::command(["EXISTS", key]))? > 0)
    }
}
