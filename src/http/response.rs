//! HTTP Response Builder and Serializer
//!
//! Every response carries `Date`, `Server`, `Connection: close`,
//! `Content-Type` and `Content-Length`; handlers only choose the status, the
//! body and any extra headers.
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Date: Mon, 19 Oct 2026 10:00:00 GMT\r\n
//! Server: bookshelf/0.1.0\r\n
//! Connection: close\r\n
//! Content-Type: application/json\r\n
//! Content-Length: 13\r\n
//! \r\n
//! {"id_book":1}
//! ```

use serde::Serialize;
use std::fmt;
use std::time::SystemTime;

const CRLF: &[u8] = b"\r\n";
const JSON: &str = "application/json";

/// Status codes the server emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
}

impl StatusCode {
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
        }
    }

    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

/// An HTTP response waiting to be serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    content_type: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    /// An empty response with a JSON content type.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            content_type: JSON.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Serializes `value` as the JSON body.
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(status).with_body(body),
            Err(e) => Self::error(
                StatusCode::InternalServerError,
                &format!("failed to encode response: {}", e),
            ),
        }
    }

    /// A `{"error": "..."}` body with the given status.
    pub fn error(status: StatusCode, message: &str) -> Self {
        let body = serde_json::to_vec(&ErrorBody { error: message })
            .unwrap_or_else(|_| br#"{"error":"internal error"}"#.to_vec());
        Self::new(status).with_body(body)
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Adds an extra header. The mandatory headers are always written by
    /// [`Response::serialize`] and cannot be overridden here.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Renders the response stamped with the current time.
    pub fn serialize(&self) -> Vec<u8> {
        self.serialize_at(SystemTime::now())
    }

    /// Renders the response with an explicit `Date`.
    pub fn serialize_at(&self, now: SystemTime) -> Vec<u8> {
        let mut buf = Vec::with_capacity(160 + self.body.len());

        buf.extend_from_slice(format!("HTTP/1.1 {}", self.status).as_bytes());
        buf.extend_from_slice(CRLF);

        let date = httpdate::fmt_http_date(now);
        let server = format!("bookshelf/{}", crate::VERSION);
        let length = self.body.len().to_string();
        let fixed = [
            ("Date", date.as_str()),
            ("Server", server.as_str()),
            ("Connection", "close"),
            ("Content-Type", self.content_type.as_str()),
            ("Content-Length", length.as_str()),
        ];

        let extra = self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()));
        for (name, value) in fixed.into_iter().chain(extra) {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(CRLF);
        }

        buf.extend_from_slice(CRLF);
        buf.extend_from_slice(&self.body);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_status_line_and_mandatory_headers() {
        let at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let bytes = Response::new(StatusCode::Ok)
            .with_body("{}")
            .serialize_at(at);
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Date: Tue, 14 Nov 2023 22:13:20 GMT\r\n"));
        assert!(text.contains(&format!("Server: bookshelf/{}\r\n", crate::VERSION)));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.contains("Content-Type: application/json\r\n"));
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(text.ends_with("\r\n\r\n{}"));
    }

    #[test]
    fn test_error_body_is_json() {
        let response = Response::error(StatusCode::NotFound, "no \"route\"");
        assert_eq!(response.status(), StatusCode::NotFound);
        assert_eq!(response.body(), br#"{"error":"no \"route\""}"#);
    }

    #[test]
    fn test_extra_headers_follow_fixed_ones() {
        let text = String::from_utf8(
            Response::error(StatusCode::MethodNotAllowed, "nope")
                .with_header("Allow", "GET, POST")
                .serialize(),
        )
        .unwrap();

        assert!(text.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        let allow = text.find("Allow: GET, POST\r\n").unwrap();
        let length = text.find("Content-Length:").unwrap();
        assert!(allow > length);
    }

    #[test]
    fn test_json_helper() {
        #[derive(Serialize)]
        struct Count {
            n: u32,
        }
        let response = Response::json(StatusCode::Ok, &Count { n: 7 });
        assert_eq!(response.body(), br#"{"n":7}"#);
        assert_eq!(response.status(), StatusCode::Ok);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(StatusCode::BadRequest.as_u16(), 400);
        assert_eq!(StatusCode::InternalServerError.to_string(), "500 Internal Server Error");
        assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    }
}
