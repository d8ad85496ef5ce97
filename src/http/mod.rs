//! HTTP/1.1 Codec
//!
//! Just enough HTTP for the book API: one request per connection, no
//! chunked encoding, no keep-alive.
//!
//! - `request`: incremental parser producing a [`Request`]
//! - `response`: [`Response`] builder and wire serializer
//!
//! ## Example
//!
//! ```
//! use bookshelf::http::{parse_request, Method, Response, StatusCode};
//!
//! let raw = b"GET /get/books?id_book=1 HTTP/1.1\r\nHost: localhost\r\n\r\n";
//! let (request, consumed) = parse_request(raw).unwrap().unwrap();
//! assert_eq!(request.method(), Method::Get);
//! assert_eq!(consumed, raw.len());
//!
//! let bytes = Response::error(StatusCode::NotFound, "no such book").serialize();
//! assert!(bytes.starts_with(b"HTTP/1.1 404 Not Found\r\n"));
//! ```

pub mod request;
pub mod response;

pub use request::{parse_request, HttpError, Method, Request, MAX_REQUEST_SIZE};
pub use response::{Response, StatusCode};
