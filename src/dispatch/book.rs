//! Book Record
//!
//! Request bodies are scanned for four known keys instead of being parsed as
//! general JSON:
//!
//! ```text
//! {"id_book": 1, "title": "Dune", "author": "Herbert", "price": 9.99}
//! ```
//!
//! Whitespace around keys, colons and values is tolerated. Nested objects,
//! arrays and escaped quotes inside strings are not supported; a string value
//! ends at the first `"` after its opening quote.

use crate::store::FieldMap;
use serde::Serialize;

pub const KEY_ID: &str = "id_book";
pub const KEY_TITLE: &str = "title";
pub const KEY_AUTHOR: &str = "author";
pub const KEY_PRICE: &str = "price";

/// Field names used for a book hash in the store.
pub mod field {
    pub const ID: &str = "id";
    pub const TITLE: &str = "title";
    pub const AUTHOR: &str = "author";
    pub const PRICE: &str = "price";
}

/// A complete book record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Book {
    #[serde(rename = "id_book")]
    pub id: i64,
    pub title: String,
    pub author: String,
    pub price: f64,
}

impl Book {
    /// Store key for the book with `id`.
    pub fn key(id: i64) -> String {
        format!("book:{}", id)
    }

    /// Renders a price the way it is stored: two decimals.
    pub fn format_price(price: f64) -> String {
        format!("{:.2}", price)
    }

    /// `price` as it reads back from the store.
    pub fn round_price(price: f64) -> f64 {
        Book::format_price(price).parse().unwrap_or(price)
    }

    /// Field/value pairs written on create.
    pub fn to_fields(&self) -> [(&'static str, String); 4] {
        [
            (field::ID, self.id.to_string()),
            (field::TITLE, self.title.clone()),
            (field::AUTHOR, self.author.clone()),
            (field::PRICE, Book::format_price(self.price)),
        ]
    }

    /// Rebuilds a book from a stored hash. Missing or unparsable fields take
    /// empty/zero values; `id` comes from the key that was looked up.
    pub fn from_fields(id: i64, fields: &FieldMap) -> Self {
        Self {
            id,
            title: fields.get(field::TITLE).cloned().unwrap_or_default(),
            author: fields.get(field::AUTHOR).cloned().unwrap_or_default(),
            price: fields
                .get(field::PRICE)
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(0.0),
        }
    }
}

/// Whatever the scanner found in a request body. Each field is `None` when
/// the key is absent or its value does not parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookFields {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub price: Option<f64>,
}

impl BookFields {
    pub fn scan(body: &str) -> Self {
        Self {
            id: find_value(body, KEY_ID).and_then(|v| v.parse().ok()),
            title: find_value(body, KEY_TITLE).map(str::to_string),
            author: find_value(body, KEY_AUTHOR).map(str::to_string),
            price: find_value(body, KEY_PRICE)
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|p| p.is_finite())
                .map(Book::round_price),
        }
    }

    /// A full record, or the name of the first missing key.
    pub fn into_book(self) -> Result<Book, &'static str> {
        Ok(Book {
            id: self.id.ok_or(KEY_ID)?,
            title: self.title.ok_or(KEY_TITLE)?,
            author: self.author.ok_or(KEY_AUTHOR)?,
            price: self.price.ok_or(KEY_PRICE)?,
        })
    }
}

/// Finds `"key"` followed by `:` and returns the raw value: the contents of
/// a quoted string, or a bare token up to `,`, `}` or whitespace.
pub fn find_value<'a>(body: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("\"{}\"", key);
    let mut from = 0;

    while let Some(found) = body[from..].find(&needle) {
        let after_key = from + found + needle.len();
        from = after_key;

        let rest = body[after_key..].trim_start();
        let Some(rest) = rest.strip_prefix(':') else {
            continue;
        };
        let rest = rest.trim_start();

        if let Some(quoted) = rest.strip_prefix('"') {
            return quoted.find('"').map(|end| &quoted[..end]);
        }

        let end = rest
            .find(|c: char| c == ',' || c == '}' || c.is_whitespace())
            .unwrap_or(rest.len());
        return (end > 0).then(|| &rest[..end]);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_full_record() {
        let fields = BookFields::scan(r#"{"id_book":1,"title":"T","author":"A","price":9.99}"#);
        assert_eq!(
            fields.into_book(),
            Ok(Book {
                id: 1,
                title: "T".to_string(),
                author: "A".to_string(),
                price: 9.99,
            })
        );
    }

    #[test]
    fn test_scan_tolerates_whitespace() {
        let body = "{\n  \"id_book\" :  42 ,\n  \"title\":\t\"The Left Hand\",  \"price\" : 7 }";
        let fields = BookFields::scan(body);
        assert_eq!(fields.id, Some(42));
        assert_eq!(fields.title.as_deref(), Some("The Left Hand"));
        assert_eq!(fields.author, None);
        assert_eq!(fields.price, Some(7.0));
        assert_eq!(fields.into_book(), Err(KEY_AUTHOR));
    }

    #[test]
    fn test_scan_rejects_bad_values() {
        let fields = BookFields::scan(r#"{"id_book":"abc","price":"cheap"}"#);
        assert_eq!(fields.id, None);
        assert_eq!(fields.price, None);
        assert_eq!(BookFields::scan(r#"{"price":NaN}"#).price, None);
    }

    #[test]
    fn test_price_rounded_to_stored_precision() {
        let fields = BookFields::scan(r#"{"id_book":1,"price":3.14159}"#);
        assert_eq!(fields.price, Some(3.14));
        assert_eq!(Book::round_price(6.499), 6.5);
        assert_eq!(Book::format_price(6.499), "6.50");
    }

    #[test]
    fn test_key_must_be_followed_by_colon() {
        // "title" first appears as a value, then as a key
        let body = r#"{"author":"title","title":"Real"}"#;
        assert_eq!(find_value(body, "title"), Some("Real"));
        assert_eq!(find_value(body, "author"), Some("title"));
        assert_eq!(find_value(body, "missing"), None);
        assert_eq!(find_value(r#"{"id_book":}"#, "id_book"), None);
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(BookFields::scan(""), BookFields::default());
    }

    #[test]
    fn test_store_fields() {
        let book = Book {
            id: 3,
            title: "T".to_string(),
            author: "A".to_string(),
            price: 12.5,
        };
        let fields = book.to_fields();
        assert_eq!(fields[3], ("price", "12.50".to_string()));

        let map: FieldMap = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        assert_eq!(Book::from_fields(3, &map), book);
        assert_eq!(Book::key(3), "book:3");
    }

    #[test]
    fn test_json_shape() {
        let book = Book {
            id: 1,
            title: "T".to_string(),
            author: "A".to_string(),
            price: 9.99,
        };
        assert_eq!(
            serde_json::to_string(&book).unwrap(),
            r#"{"id_book":1,"title":"T","author":"A","price":9.99}"#
        );
    }
}
