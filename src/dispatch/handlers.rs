//! CRUD Handlers
//!
//! Each handler performs exactly one store call. A store failure produces a
//! 500 and the handler returns straight away.

use super::book::{field, Book, BookFields, KEY_ID, KEY_PRICE};
use crate::http::{Request, Response, StatusCode};
use crate::store::{StoreConnection, StoreError};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct PriceUpdate {
    id_book: i64,
    price: f64,
}

#[derive(Debug, Serialize)]
struct Deleted {
    id_book: i64,
}

fn store_failure(key: &str, err: StoreError) -> Response {
    warn!(key = %key, error = %err, "Store operation failed");
    Response::error(StatusCode::InternalServerError, "store operation failed")
}

fn missing_field(name: &str) -> Response {
    Response::error(
        StatusCode::BadRequest,
        &format!("missing or invalid field: {}", name),
    )
}

/// `id_book` from the body, falling back to the query string.
fn requested_id(request: &Request, fields: &BookFields) -> Option<i64> {
    fields.id.or_else(|| {
        request
            .query_param(KEY_ID)
            .and_then(|v| v.trim().parse().ok())
    })
}

/// `POST /add/book`: writes every field of the record.
pub fn create(conn: &mut dyn StoreConnection, request: &Request) -> Response {
    let book = match BookFields::scan(&request.body_str()).into_book() {
        Ok(book) => book,
        Err(field) => return missing_field(field),
    };

    let key = Book::key(book.id);
    let fields = book.to_fields();
    let pairs: Vec<(&str, &str)> = fields.iter().map(|(f, v)| (*f, v.as_str())).collect();

    if let Err(e) = conn.upsert_fields(&key, &pairs) {
        return store_failure(&key, e);
    }

    debug!(key = %key, "Book stored");
    Response::json(StatusCode::Ok, &book)
}

/// `GET /get/books`: fetches one record.
pub fn read(conn: &mut dyn StoreConnection, request: &Request) -> Response {
    let fields = BookFields::scan(&request.body_str());
    let Some(id) = requested_id(request, &fields) else {
        return missing_field(KEY_ID);
    };

    let key = Book::key(id);
    match conn.get_all_fields(&key) {
        Ok(Some(stored)) => Response::json(StatusCode::Ok, &Book::from_fields(id, &stored)),
        Ok(None) => Response::error(StatusCode::NotFound, "book not found"),
        Err(e) => store_failure(&key, e),
    }
}

/// `PUT|PATCH /update/book`: overwrites the price.
pub fn update(conn: &mut dyn StoreConnection, request: &Request) -> Response {
    let fields = BookFields::scan(&request.body_str());
    let Some(id) = requested_id(request, &fields) else {
        return missing_field(KEY_ID);
    };
    let Some(price) = fields.price else {
        return missing_field(KEY_PRICE);
    };

    let key = Book::key(id);
    if let Err(e) = conn.set_field(&key, field::PRICE, &Book::format_price(price)) {
        return store_failure(&key, e);
    }

    debug!(key = %key, price, "Price updated");
    Response::json(StatusCode::Ok, &PriceUpdate { id_book: id, price })
}

/// `DELETE /delete/book`: removes the record.
pub fn delete(conn: &mut dyn StoreConnection, request: &Request) -> Response {
    let fields = BookFields::scan(&request.body_str());
    let Some(id) = requested_id(request, &fields) else {
        return missing_field(KEY_ID);
    };

    let key = Book::key(id);
    match conn.delete(&key) {
        Ok(0) => Response::error(StatusCode::NotFound, "book not found"),
        Ok(_) => {
            debug!(key = %key, "Book deleted");
            Response::json(StatusCode::Ok, &Deleted { id_book: id })
        }
        Err(e) => store_failure(&key, e),
    }
}
