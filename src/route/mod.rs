//! # Route Module
//!
//! A [`Route`] is the single declaration an endpoint is derived from: the
//! request pipeline reads its schemas, dependencies and handler, and the
//! document generator reads the same schemas plus its [`RouteMetadata`].
//!
//! ## Construction
//!
//! Routes are built from a method, a path template and a [`RouteConfig`].
//! Construction checks everything that can be checked without a registry:
//!
//! - the template parses (`/users/{id}`, identifier names, no duplicates)
//! - every declared schema is usable by its backend
//! - the params schema names exactly the template's parameters
//! - a handler is present
//!
//! After construction a route is immutable and is shared as `Arc<Route>`.
//!
//! ## Handlers
//!
//! Handlers are async closures taking a [`RequestContext`] and returning any
//! `Serialize` value or a [`crate::error::HandlerError`]. The context exposes
//! the parsed inputs, resolved dependencies and the background task hook.

mod context;
mod core;
mod template;

pub use context::{
    HeaderVec, ParamVec, RequestContext, RequestHead, MAX_INLINE_HEADERS, MAX_INLINE_PARAMS,
};
pub use core::{Handler, HandlerFuture, Route, RouteConfig, RouteMetadata};
pub use template::{normalize_path, split_segments, PathTemplate, Segment};
