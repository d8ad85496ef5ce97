//! Incremental HTTP/1.1 Request Parser
//!
//! Parses a request out of a connection's accumulation buffer. The contract
//! matches the store client's RESP parser:
//!
//! - `Ok(Some((request, consumed)))` - a complete request was parsed
//! - `Ok(None)` - the header block or the declared body has not fully arrived
//! - `Err(HttpError)` - the bytes can never form a valid request
//!
//! A request is complete once the blank line ending the header block is
//! present and, when `Content-Length` is given, exactly that many body bytes
//! follow it. Without `Content-Length` the body is whatever trails the header
//! block in the buffer.
//!
//! ## Limits
//!
//! Every field is an owned string validated against a maximum length; going
//! over any limit is a protocol error (answered with 400).

use bytes::Bytes;
use std::fmt;
use thiserror::Error;

pub const MAX_METHOD_LEN: usize = 16;
pub const MAX_URI_LEN: usize = 2048;
pub const MAX_VERSION_LEN: usize = 16;
pub const MAX_HEADER_NAME_LEN: usize = 256;
pub const MAX_HEADER_VALUE_LEN: usize = 1024;
pub const MAX_HEADERS: usize = 50;

/// Largest request (headers plus body) a connection may buffer.
pub const MAX_REQUEST_SIZE: usize = 64 * 1024;

/// Protocol errors raised while parsing a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("malformed request line")]
    MalformedRequestLine,

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    #[error("malformed header line")]
    MalformedHeader,

    #[error("too many headers (max: {MAX_HEADERS})")]
    TooManyHeaders,

    #[error("{field} too long (max: {max} bytes)")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("invalid Content-Length")]
    InvalidContentLength,

    #[error("request too large: {size} bytes (max: {max})")]
    RequestTooLarge { size: usize, max: usize },

    #[error("request head is not valid UTF-8")]
    InvalidUtf8,
}

/// HTTP request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Trace,
    Connect,
    Unknown,
}

impl Method {
    /// Case-insensitive lookup; anything unrecognized maps to `Unknown`.
    pub fn from_token(token: &str) -> Self {
        const TABLE: [(&str, Method); 9] = [
            ("GET", Method::Get),
            ("POST", Method::Post),
            ("PUT", Method::Put),
            ("DELETE", Method::Delete),
            ("HEAD", Method::Head),
            ("OPTIONS", Method::Options),
            ("PATCH", Method::Patch),
            ("TRACE", Method::Trace),
            ("CONNECT", Method::Connect),
        ];

        TABLE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(token))
            .map(|(_, method)| *method)
            .unwrap_or(Method::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully parsed request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    uri: String,
    path: String,
    query: Vec<(String, String)>,
    version: String,
    headers: Vec<(String, String)>,
    content_length: usize,
    body: Bytes,
}

impl Request {
    pub fn method(&self) -> Method {
        self.method
    }

    /// The raw request target, query string included.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup; the first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Looks up a URL-decoded query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Declared `Content-Length`, or the length of the trailing bytes when
    /// the header was absent.
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn body_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Attempts to parse one request from the front of `buf`.
pub fn parse_request(buf: &[u8]) -> Result<Option<(Request, usize)>, HttpError> {
    let (head_len, sep_len) = match find_head_end(buf) {
        Some(found) => found,
        None => {
            if buf.len() > MAX_REQUEST_SIZE {
                return Err(HttpError::RequestTooLarge {
                    size: buf.len(),
                    max: MAX_REQUEST_SIZE,
                });
            }
            return Ok(None);
        }
    };

    let head = std::str::from_utf8(&buf[..head_len]).map_err(|_| HttpError::InvalidUtf8)?;
    let mut lines = head.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

    let request_line = lines.next().ok_or(HttpError::MalformedRequestLine)?;
    let (method, uri, version) = parse_request_line(request_line)?;

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        if headers.len() >= MAX_HEADERS {
            return Err(HttpError::TooManyHeaders);
        }
        headers.push(parse_header_line(line)?);
    }

    let declared = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("Content-Length"))
        .map(|(_, v)| v.parse::<usize>().map_err(|_| HttpError::InvalidContentLength))
        .transpose()?;

    let body_start = head_len + sep_len;
    let available = buf.len() - body_start;

    let body_len = match declared {
        Some(len) => {
            if len > MAX_REQUEST_SIZE.saturating_sub(body_start) {
                return Err(HttpError::RequestTooLarge {
                    size: body_start.saturating_add(len),
                    max: MAX_REQUEST_SIZE,
                });
            }
            if available < len {
                return Ok(None);
            }
            len
        }
        None => available,
    };

    let body = Bytes::copy_from_slice(&buf[body_start..body_start + body_len]);
    let (path, query) = split_target(&uri);

    let request = Request {
        method,
        uri,
        path,
        query,
        version,
        headers,
        content_length: body_len,
        body,
    };

    Ok(Some((request, body_start + body_len)))
}

/// Finds the end of the header block. Returns the head length and the
/// length of the separator (`\r\n\r\n` or a bare `\n\n`).
fn find_head_end(buf: &[u8]) -> Option<(usize, usize)> {
    for i in 0..buf.len() {
        if buf[i..].starts_with(b"\r\n\r\n") {
            return Some((i, 4));
        }
        if buf[i..].starts_with(b"\n\n") {
            return Some((i, 2));
        }
    }
    None
}

fn parse_request_line(line: &str) -> Result<(Method, String, String), HttpError> {
    let mut parts = line.split_ascii_whitespace();
    let (method, uri, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(u), Some(v), None) => (m, u, v),
        _ => return Err(HttpError::MalformedRequestLine),
    };

    check_len("method", method, MAX_METHOD_LEN)?;
    check_len("uri", uri, MAX_URI_LEN)?;
    check_len("version", version, MAX_VERSION_LEN)?;

    if !version.starts_with("HTTP/1.") {
        return Err(HttpError::UnsupportedVersion(version.to_string()));
    }

    Ok((Method::from_token(method), uri.to_string(), version.to_string()))
}

fn parse_header_line(line: &str) -> Result<(String, String), HttpError> {
    let (name, value) = line.split_once(':').ok_or(HttpError::MalformedHeader)?;
    let name = name.trim();
    let value = value.trim();

    if name.is_empty() {
        return Err(HttpError::MalformedHeader);
    }
    check_len("header name", name, MAX_HEADER_NAME_LEN)?;
    check_len("header value", value, MAX_HEADER_VALUE_LEN)?;

    Ok((name.to_string(), value.to_string()))
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), HttpError> {
    if value.len() > max {
        return Err(HttpError::FieldTooLong { field, max });
    }
    Ok(())
}

fn split_target(uri: &str) -> (String, Vec<(String, String)>) {
    match uri.split_once('?') {
        Some((path, query)) => (path.to_string(), parse_query(query)),
        None => (uri.to_string(), Vec::new()),
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => (url_decode(name), url_decode(value)),
            None => (url_decode(pair), String::new()),
        })
        .collect()
}

/// Decodes `%XX` escapes and `+` as space. Bad escapes pass through as-is.
fn url_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi * 16 + lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_complete(input: &[u8]) -> (Request, usize) {
        parse_request(input).unwrap().unwrap()
    }

    #[test]
    fn test_parse_get_with_body() {
        let input = b"GET /get/books HTTP/1.1\r\nContent-Length: 13\r\n\r\n{\"id_book\":3}";
        let (request, consumed) = parse_complete(input);

        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.path(), "/get/books");
        assert_eq!(request.content_length(), 13);
        assert_eq!(request.body(), b"{\"id_book\":3}");
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_parse_headers_case_insensitive() {
        let input = b"POST /add/book HTTP/1.1\r\n\
                      Host: localhost\r\n\
                      content-type:  application/json \r\n\r\n";
        let (request, _) = parse_complete(input);

        assert_eq!(request.header("Host"), Some("localhost"));
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert_eq!(request.headers().len(), 2);
        assert_eq!(request.header("missing"), None);
    }

    #[test]
    fn test_incomplete_head() {
        assert!(parse_request(b"GET /get/books HTTP/1.1\r\nHost: x\r\n")
            .unwrap()
            .is_none());
        assert!(parse_request(b"").unwrap().is_none());
    }

    #[test]
    fn test_incomplete_body_waits_for_more() {
        let input = b"POST /add/book HTTP/1.1\r\nContent-Length: 10\r\n\r\n{\"id\"";
        assert!(parse_request(input).unwrap().is_none());
    }

    #[test]
    fn test_body_without_content_length_takes_rest() {
        let input = b"DELETE /delete/book HTTP/1.1\r\n\r\n{\"id_book\":9}";
        let (request, consumed) = parse_complete(input);

        assert_eq!(request.body_str(), "{\"id_book\":9}");
        assert_eq!(request.content_length(), 13);
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_extra_bytes_not_consumed() {
        let input = b"GET / HTTP/1.1\r\nContent-Length: 2\r\n\r\nabEXTRA";
        let (request, consumed) = parse_complete(input);

        assert_eq!(request.body(), b"ab");
        assert_eq!(consumed, input.len() - 5);
    }

    #[test]
    fn test_bare_newline_separator() {
        let (request, _) = parse_complete(b"GET /get/books HTTP/1.0\nHost: a\n\n");
        assert_eq!(request.version(), "HTTP/1.0");
        assert_eq!(request.header("host"), Some("a"));
    }

    #[test]
    fn test_unknown_method_is_parsed() {
        let (request, _) = parse_complete(b"BREW /pot HTTP/1.1\r\n\r\n");
        assert_eq!(request.method(), Method::Unknown);

        let (request, _) = parse_complete(b"options /add/book HTTP/1.1\r\n\r\n");
        assert_eq!(request.method(), Method::Options);
    }

    #[test]
    fn test_query_string_decoded() {
        let (request, _) =
            parse_complete(b"GET /get/books?id_book=4&q=a+b%21&flag HTTP/1.1\r\n\r\n");

        assert_eq!(request.path(), "/get/books");
        assert_eq!(request.uri(), "/get/books?id_book=4&q=a+b%21&flag");
        assert_eq!(request.query_param("id_book"), Some("4"));
        assert_eq!(request.query_param("q"), Some("a b!"));
        assert_eq!(request.query_param("flag"), Some(""));
    }

    #[test]
    fn test_url_decode_bad_escape_passthrough() {
        assert_eq!(url_decode("100%"), "100%");
        assert_eq!(url_decode("%zz"), "%zz");
        assert_eq!(url_decode("%41"), "A");
    }

    #[test]
    fn test_malformed_request_line() {
        assert_eq!(
            parse_request(b"GARBAGE\r\n\r\n"),
            Err(HttpError::MalformedRequestLine)
        );
        assert_eq!(
            parse_request(b"GET / HTTP/1.1 extra\r\n\r\n"),
            Err(HttpError::MalformedRequestLine)
        );
    }

    #[test]
    fn test_unsupported_version() {
        assert!(matches!(
            parse_request(b"GET / SPDY/3\r\n\r\n"),
            Err(HttpError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_malformed_header() {
        assert_eq!(
            parse_request(b"GET / HTTP/1.1\r\nno-colon-here\r\n\r\n"),
            Err(HttpError::MalformedHeader)
        );
    }

    #[test]
    fn test_invalid_content_length() {
        assert_eq!(
            parse_request(b"GET / HTTP/1.1\r\nContent-Length: ten\r\n\r\n"),
            Err(HttpError::InvalidContentLength)
        );
    }

    #[test]
    fn test_field_limits() {
        let long_uri = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(MAX_URI_LEN));
        assert_eq!(
            parse_request(long_uri.as_bytes()),
            Err(HttpError::FieldTooLong {
                field: "uri",
                max: MAX_URI_LEN
            })
        );

        let mut many = String::from("GET / HTTP/1.1\r\n");
        for i in 0..=MAX_HEADERS {
            many.push_str(&format!("X-{}: v\r\n", i));
        }
        many.push_str("\r\n");
        assert_eq!(
            parse_request(many.as_bytes()),
            Err(HttpError::TooManyHeaders)
        );
    }

    #[test]
    fn test_oversized_requests_rejected() {
        let unterminated = vec![b'a'; MAX_REQUEST_SIZE + 1];
        assert!(matches!(
            parse_request(&unterminated),
            Err(HttpError::RequestTooLarge { .. })
        ));

        let huge_body = format!(
            "POST /add/book HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            MAX_REQUEST_SIZE
        );
        assert!(matches!(
            parse_request(huge_body.as_bytes()),
            Err(HttpError::RequestTooLarge { .. })
        ));

        let max_length = format!(
            "POST /add/book HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            usize::MAX
        );
        assert!(matches!(
            parse_request(max_length.as_bytes()),
            Err(HttpError::RequestTooLarge { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_head() {
        assert_eq!(
            parse_request(b"\x00\x01\xff\xfe garbage\r\n\r\n"),
            Err(HttpError::InvalidUtf8)
        );
    }
}
