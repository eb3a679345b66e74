//! # Registry Module
//!
//! The authoritative collection of routes. Registration happens during setup;
//! afterwards the registry is frozen and only read.
//!
//! ## Matching
//!
//! Templates are stored in a radix tree keyed by path segment. Matching splits
//! the request path on `/`, requires the same number of segments, compares
//! literal segments exactly (case-sensitive) and captures `{name}` segments
//! as raw strings. Lookup cost is proportional to the number of segments, not
//! the number of routes.
//!
//! ## Conflicts
//!
//! Ambiguity is prevented at registration, never resolved at match time:
//!
//! - same method and same template shape -> [`DuplicateRoute`](crate::error::EngineError::DuplicateRoute)
//! - same method, overlapping shapes such as `/users/me` and `/users/{id}` ->
//!   [`AmbiguousRoute`](crate::error::EngineError::AmbiguousRoute)
//! - repeated operation id -> [`DuplicateOperationId`](crate::error::EngineError::DuplicateOperationId)
//!
//! ```rust
//! use brrtapi::registry::RouteRegistry;
//! use brrtapi::route::{Route, RouteConfig};
//! use http::Method;
//! use serde_json::json;
//!
//! let mut registry = RouteRegistry::new();
//! let ping = || RouteConfig::new().handler(|_| async { Ok(json!("pong")) });
//! registry.register(Route::new(Method::GET, "/ping", ping()).unwrap()).unwrap();
//!
//! let dup = Route::new(Method::GET, "/ping/", ping().operation_id("ping2")).unwrap();
//! assert!(registry.register(dup).is_err());
//! assert_eq!(registry.len(), 1);
//! ```

mod core;
mod radix;

pub use core::{RouteMatch, RouteRegistry};
