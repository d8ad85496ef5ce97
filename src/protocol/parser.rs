//! Incremental RESP Reply Parser
//!
//! Replies may arrive split across several socket reads, so the parser works
//! on whatever has been buffered so far and reports one of:
//!
//! - `Ok(Some((value, consumed)))` - a whole frame was parsed
//! - `Ok(None)` - the frame is incomplete, read more and retry
//! - `Err(ParseError)` - the bytes are not valid RESP
//!
//! The caller appends to a `BytesMut`, retries after every read, and advances
//! past `consumed` bytes on success.

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur during RESP parsing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("unknown type prefix: {0:#04x}")]
    UnknownPrefix(u8),

    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Largest bulk string accepted from the store
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array nesting depth
pub const MAX_NESTING_DEPTH: usize = 32;

/// Parses a single frame from the front of `buf`.
pub fn parse_message(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    parse_value(buf, 0)
}

fn parse_value(buf: &[u8], depth: usize) -> ParseResult<Option<(RespValue, usize)>> {
    if buf.is_empty() {
        return Ok(None);
    }

    if depth > MAX_NESTING_DEPTH {
        return Err(ParseError::ProtocolError(format!(
            "maximum nesting depth exceeded: {}",
            MAX_NESTING_DEPTH
        )));
    }

    match buf[0] {
        prefix::SIMPLE_STRING => Ok(read_line(buf)?
            .map(|(s, used)| (RespValue::SimpleString(s.to_string()), used))),
        prefix::ERROR => {
            Ok(read_line(buf)?.map(|(s, used)| (RespValue::Error(s.to_string()), used)))
        }
        prefix::INTEGER => match read_line(buf)? {
            Some((s, used)) => Ok(Some((RespValue::Integer(parse_int(s)?), used))),
            None => Ok(None),
        },
        prefix::BULK_STRING => parse_bulk_string(buf),
        prefix::ARRAY => parse_array(buf, depth),
        other => Err(ParseError::UnknownPrefix(other)),
    }
}

/// Reads the text between the prefix byte and the first CRLF.
fn read_line(buf: &[u8]) -> ParseResult<Option<(&str, usize)>> {
    match find_crlf(&buf[1..]) {
        Some(pos) => {
            let s = std::str::from_utf8(&buf[1..1 + pos])
                .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
            // prefix + content + CRLF
            Ok(Some((s, 1 + pos + 2)))
        }
        None => Ok(None),
    }
}

fn parse_int(s: &str) -> ParseResult<i64> {
    s.parse()
        .map_err(|e: std::num::ParseIntError| ParseError::InvalidInteger(e.to_string()))
}

/// `$<length>\r\n<data>\r\n`
fn parse_bulk_string(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    let (length, header) = match read_line(buf)? {
        Some((s, used)) => (parse_int(s)?, used),
        None => return Ok(None),
    };

    if length == -1 {
        return Ok(Some((RespValue::Null, header)));
    }
    if length < 0 {
        return Err(ParseError::InvalidBulkLength(length));
    }

    let length = length as usize;
    if length > MAX_BULK_SIZE {
        return Err(ParseError::MessageTooLarge {
            size: length,
            max: MAX_BULK_SIZE,
        });
    }

    let total = header + length + 2;
    if buf.len() < total {
        return Ok(None);
    }
    if &buf[header + length..total] != CRLF {
        return Err(ParseError::ProtocolError(
            "bulk string missing trailing CRLF".to_string(),
        ));
    }

    let data = Bytes::copy_from_slice(&buf[header..header + length]);
    Ok(Some((RespValue::BulkString(data), total)))
}

/// `*<count>\r\n<elements...>`
fn parse_array(buf: &[u8], depth: usize) -> ParseResult<Option<(RespValue, usize)>> {
    let (count, mut consumed) = match read_line(buf)? {
        Some((s, used)) => (parse_int(s)?, used),
        None => return Ok(None),
    };

    if count == -1 {
        return Ok(Some((RespValue::Null, consumed)));
    }
    if count < 0 {
        return Err(ParseError::InvalidArrayLength(count));
    }

    let mut elements = Vec::with_capacity((count as usize).min(1024));
    for _ in 0..count {
        match parse_value(&buf[consumed..], depth + 1)? {
            Some((value, used)) => {
                elements.push(value);
                consumed += used;
            }
            None => return Ok(None),
        }
    }

    Ok(Some((RespValue::Array(elements), consumed)))
}

/// Position of the `\r` of the first CRLF, if any.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_string() {
        let (value, used) = parse_message(b"+OK\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::SimpleString("OK".to_string()));
        assert_eq!(used, 5);
    }

    #[test]
    fn test_parse_error_reply() {
        let input = b"-WRONGTYPE Operation against a key\r\n";
        let (value, used) = parse_message(input).unwrap().unwrap();
        assert_eq!(
            value,
            RespValue::Error("WRONGTYPE Operation against a key".to_string())
        );
        assert_eq!(used, input.len());
    }

    #[test]
    fn test_parse_integer() {
        let (value, _) = parse_message(b":4\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Integer(4));
        assert!(matches!(
            parse_message(b":four\r\n"),
            Err(ParseError::InvalidInteger(_))
        ));
    }

    #[test]
    fn test_parse_bulk_and_null() {
        let (value, used) = parse_message(b"$5\r\nhel\x00o\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::BulkString(Bytes::from(&b"hel\x00o"[..])));
        assert_eq!(used, 11);

        let (value, used) = parse_message(b"$-1\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Null);
        assert_eq!(used, 5);
    }

    #[test]
    fn test_parse_hgetall_reply() {
        let input = b"*4\r\n$5\r\ntitle\r\n$4\r\nDune\r\n$5\r\nprice\r\n$4\r\n9.99\r\n";
        let (value, used) = parse_message(input).unwrap().unwrap();
        assert_eq!(used, input.len());
        assert_eq!(
            value,
            RespValue::command(["title", "Dune", "price", "9.99"])
        );
    }

    #[test]
    fn test_incomplete_frames() {
        for partial in [
            &b"+OK"[..],
            b"$5\r\nhel",
            b"$5\r\nhello",
            b"*2\r\n$1\r\na\r\n",
            b"*2\r\n",
            b"",
        ] {
            assert_eq!(parse_message(partial), Ok(None), "{:?}", partial);
        }
    }

    #[test]
    fn test_protocol_violations() {
        assert_eq!(parse_message(b"?x\r\n"), Err(ParseError::UnknownPrefix(b'?')));
        assert_eq!(
            parse_message(b"$-2\r\n"),
            Err(ParseError::InvalidBulkLength(-2))
        );
        assert_eq!(
            parse_message(b"*-5\r\n"),
            Err(ParseError::InvalidArrayLength(-5))
        );
        assert!(matches!(
            parse_message(b"$2\r\nabXY"),
            Err(ParseError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = "*1\r\n".repeat(MAX_NESTING_DEPTH + 2) + ":1\r\n";
        assert!(matches!(
            parse_message(deep.as_bytes()),
            Err(ParseError::ProtocolError(_))
        ));
    }
}
