//! RESP Protocol Implementation
//!
//! Wire format spoken between the workers and the backing key-value store.
//!
//! - `types`: the [`RespValue`] frame and its serializer
//! - `parser`: incremental reply parser
//!
//! ## Example
//!
//! ```
//! use bookshelf::protocol::{parse_message, RespValue};
//!
//! let request = RespValue::command(["DEL", "book:7"]).serialize();
//! assert_eq!(request, b"*2\r\n$3\r\nDEL\r\n$6\r\nbook:7\r\n");
//!
//! let (reply, consumed) = parse_message(b":1\r\n").unwrap().unwrap();
//! assert_eq!(reply, RespValue::Integer(1));
//! assert_eq!(consumed, 4);
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_message, ParseError, ParseResult};
pub use types::RespValue;
