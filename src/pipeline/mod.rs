//! # Pipeline Module
//!
//! Setup and serving. An [`App`] collects providers and routes; [`App::build`]
//! freezes them into an [`Engine`], which runs every request through the
//! same fixed sequence:
//!
//! ```text
//! Matching -> Validating (path, query, body) -> Resolving -> Invoking
//!          -> Response check -> Encoding -> Task submission
//! ```
//!
//! Request-scoped dependencies are torn down after invoking whatever the
//! outcome. Background tasks are kept only when the handler succeeded and
//! its output passed the response check; a failed request drops them. They
//! start after the response exists: [`Engine::handle`] submits them once the
//! response is built, and [`Engine::dispatch`] hands them back in an
//! [`AfterResponse`] for the transport to run after writing.
//!
//! ## Failures
//!
//! Every per-request failure becomes an [`EngineResponse`] with a structured
//! body (`status`, `detail`, optional per-field `errors`):
//!
//! | Failure | Status |
//! |---|---|
//! | no route | 404 |
//! | path matches, method doesn't | 405 + `allow` |
//! | input validation | 422 |
//! | `HandlerError::Http` | its own status and headers |
//! | dependency, handler panic, response contract | 500 |
//!
//! ## Built-in Routes
//!
//! Unless disabled in [`crate::config::EngineConfig`], `build` adds the
//! generated document as JSON and YAML plus a per-route schema endpoint.
//! They are registered only where no user route already sits, and they are
//! left out of the document itself.
//!
//! ```rust
//! use brrtapi::pipeline::{App, EngineRequest};
//! use brrtapi::route::RouteConfig;
//! use http::{Method, StatusCode};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut app = App::default();
//! app.get("/ping", RouteConfig::new().handler(|_| async { Ok("pong") }))
//!     .unwrap();
//! let engine = app.build().unwrap();
//!
//! let response = engine.handle(EngineRequest::new(Method::GET, "/ping")).await;
//! assert_eq!(response.status, StatusCode::OK);
//! assert_eq!(response.body, json!("pong"));
//! # }
//! ```

mod app;
mod builtin;
mod engine;
mod request;

pub use app::App;
pub use engine::{AfterResponse, Dispatched, Engine};
pub use request::{EngineRequest, EngineResponse};
