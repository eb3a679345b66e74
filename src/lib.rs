//! # brrtapi
//!
//! **brrtapi** is a declarative route engine: declare an endpoint once and
//! both the request pipeline and the [OpenAPI 3.1.0](https://spec.openapis.org/oas/v3.1.0)
//! document are derived from that single declaration.
//!
//! ## Overview
//!
//! A route names its method, path template, input and output schemas,
//! dependencies and handler. From the same registry the engine
//!
//! - matches incoming requests and extracts path parameters,
//! - validates and coerces path, query and body inputs,
//! - resolves singleton and request-scoped dependencies,
//! - invokes the handler and checks its output against the response schema,
//! - runs background tasks after the response, under supervision,
//! - generates a deterministic OpenAPI document.
//!
//! ## Architecture
//!
//! - **[`route`]** - route declarations, path templates and the handler context
//! - **[`registry`]** - radix-tree registry with setup-time conflict detection
//! - **[`schema`]** - schema capability surface and the JSON Schema backend
//! - **[`dependency`]** - dependency descriptors, planning and the injector
//! - **[`background`]** - detached task queue and supervisor
//! - **[`openapi`]** - document model and generator
//! - **[`pipeline`]** - [`App`] (setup) and [`Engine`] (serving)
//! - **[`transport`]** - interface an HTTP server implements to host an engine
//! - **[`testing`]** - in-process client and boundary tables
//! - **[`config`]**, **[`logging`]**, **[`error`]**, **[`ids`]** - ambient support
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Transport
//!     participant Engine
//!     participant Registry
//!     participant Schema as SchemaAdapter
//!     participant Injector
//!     participant Handler
//!     participant Supervisor as TaskSupervisor
//!
//!     Transport->>Engine: EngineRequest
//!     Engine->>Registry: find(method, path)
//!     alt No match
//!         Engine-->>Transport: 404 / 405 + allow
//!     end
//!     Engine->>Schema: validate path, query, body
//!     alt Invalid input
//!         Engine-->>Transport: 422 with per-field errors
//!     end
//!     Engine->>Injector: resolve(plan)
//!     Engine->>Handler: RequestContext
//!     Handler-->>Engine: Value or HandlerError
//!     Engine->>Schema: check response
//!     Engine->>Injector: teardown request scope
//!     Engine-->>Transport: Dispatched (EngineResponse + AfterResponse)
//!     Transport->>Transport: write response
//!     Transport->>Supervisor: AfterResponse::run (queued tasks)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtapi::{App, DocumentInfo, RouteConfig};
//! use brrtapi::testing::TestClient;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut app = App::default();
//! app.info(DocumentInfo::new("Users", "1.0.0"));
//! app.get(
//!     "/users/{id}",
//!     RouteConfig::new()
//!         .params(json!({
//!             "type": "object",
//!             "properties": { "id": { "type": "integer" } },
//!             "required": ["id"]
//!         }))
//!         .handler(|ctx| async move { Ok(json!({ "id": ctx.params()["id"] })) }),
//! )
//! .unwrap();
//!
//! let client = TestClient::new(app.build().unwrap());
//! let response = client.get("/users/123").send().await;
//! response.assert_status(200).assert_json(&json!({ "id": 123 }));
//!
//! let document = client.get("/openapi.json").send().await;
//! assert_eq!(document.json()["info"]["title"], "Users");
//! # }
//! ```

pub mod background;
pub mod config;
pub mod dependency;
pub mod error;
pub mod ids;
pub mod logging;
pub mod openapi;
pub mod pipeline;
pub mod registry;
pub mod route;
pub mod schema;
pub mod testing;
pub mod transport;

pub use background::{BackgroundTasks, TaskOptions};
pub use config::EngineConfig;
pub use dependency::{Dependency, Lifetime};
pub use error::{EngineError, HandlerError};
pub use ids::{RequestId, TaskId};
pub use openapi::DocumentInfo;
pub use pipeline::{AfterResponse, App, Dispatched, Engine, EngineRequest, EngineResponse};
pub use route::{RequestContext, Route, RouteConfig};
pub use schema::JsonSchema;
