//! # OpenAPI Module
//!
//! Derives an OpenAPI 3.1 document from the same route declarations the
//! request pipeline executes, so documentation and behaviour cannot drift.
//!
//! For every route the generator emits:
//!
//! - a `path` parameter per template segment, in template order
//! - a `query` parameter per field of the query schema, `required` unless the
//!   field is optional
//! - an `application/json` request body (`required: true`) when a body schema
//!   is declared
//! - a response keyed by the route's status code, carrying the structural
//!   response schema when one is declared
//! - a `422` response referencing `HTTPValidationError` when the route
//!   validates any input
//! - tags, summary, description, operation id and deprecated flag, verbatim
//!
//! Generation is pure and deterministic; [`Document::fingerprint`] makes the
//! byte-identical property checkable.
//!
//! ```rust
//! use brrtapi::openapi::{generate, DocumentInfo};
//! use brrtapi::route::{Route, RouteConfig};
//! use http::Method;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let routes = vec![Arc::new(
//!     Route::new(
//!         Method::GET,
//!         "/ping",
//!         RouteConfig::new().tag("health").handler(|_| async { Ok("pong") }),
//!     )
//!     .unwrap(),
//! )];
//! let doc = generate(&routes, &DocumentInfo::new("Demo", "1.0.0")).unwrap();
//! assert_eq!(doc.operation("/ping", "get").unwrap().tags, vec!["health"]);
//! assert_eq!(doc.fingerprint().unwrap(), doc.fingerprint().unwrap());
//! ```

mod document;
mod generator;
#[cfg(test)]
mod tests;

pub use document::{
    Components, Document, Info, MediaType, Operation, Parameter, ParameterLocation, PathItem,
    RequestBody, Response, Server, OPENAPI_VERSION,
};
pub use generator::{generate, route_schema, DocumentInfo, Introspect, JSON_MEDIA_TYPE};
