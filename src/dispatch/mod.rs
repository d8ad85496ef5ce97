//! Request Dispatch
//!
//! Routes a parsed request to a CRUD handler by path prefix and method.
//!
//! | Path prefix    | Methods      | Handler  | Store call       |
//! |----------------|--------------|----------|------------------|
//! | `/add/book`    | `POST`       | create   | `upsert_fields`  |
//! | `/get/books`   | `GET`        | read     | `get_all_fields` |
//! | `/update/book` | `PUT, PATCH` | update   | `set_field`      |
//! | `/delete/book` | `DELETE`     | delete   | `delete`         |
//!
//! Unknown paths get a 404. A known path with any other method gets a 405
//! and an `Allow` header.

pub mod book;
pub mod handlers;

pub use book::{Book, BookFields};

use crate::http::{Method, Request, Response, StatusCode};
use crate::store::StoreConnection;
use tracing::debug;

/// Value of the `Allow` header on 405 responses.
pub const ALLOWED_METHODS: &str = "GET, POST, PUT, PATCH, DELETE";

/// Turns one request into one response using a store connection the caller
/// already holds.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, conn: &mut dyn StoreConnection, request: &Request) -> Response;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Create,
    Read,
    Update,
    Delete,
}

const ROUTES: &[(&str, Route)] = &[
    ("/add/book", Route::Create),
    ("/get/books", Route::Read),
    ("/update/book", Route::Update),
    ("/delete/book", Route::Delete),
];

impl Route {
    fn find(path: &str) -> Option<Route> {
        ROUTES
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix))
            .map(|(_, route)| *route)
    }

    fn accepts(self, method: Method) -> bool {
        match self {
            Route::Create => method == Method::Post,
            Route::Read => method == Method::Get,
            Route::Update => matches!(method, Method::Put | Method::Patch),
            Route::Delete => method == Method::Delete,
        }
    }
}

/// The book API router.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher;

impl Dispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Routes and runs `request` against `conn`.
    pub fn dispatch(&self, conn: &mut dyn StoreConnection, request: &Request) -> Response {
        let Some(route) = Route::find(request.path()) else {
            return Response::error(StatusCode::NotFound, "endpoint not found");
        };

        if !route.accepts(request.method()) {
            return Response::error(StatusCode::MethodNotAllowed, "method not allowed")
                .with_header("Allow", ALLOWED_METHODS);
        }

        match route {
            Route::Create => handlers::create(conn, request),
            Route::Read => handlers::read(conn, request),
            Route::Update => handlers::update(conn, request),
            Route::Delete => handlers::delete(conn, request),
        }
    }
}

impl RequestHandler for Dispatcher {
    fn handle(&self, conn: &mut dyn StoreConnection, request: &Request) -> Response {
        let response = self.dispatch(conn, request);
        debug!(
            method = %request.method(),
            path = %request.path(),
            status = response.status().as_u16(),
            "Request dispatched"
        );
        response
    }
}
