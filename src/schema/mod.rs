//! # Schema Module
//!
//! The schema module is the only place the route engine touches a validation
//! library. Routes, the request pipeline and the document generator all work
//! against the [`Schema`] capability trait:
//!
//! - **validate** - parse a raw value into a validated value, or report one
//!   [`ValidationIssue`] per violated field
//! - **is_optional / is_nullable / describe** - introspection for documentation
//! - **structural** - a JSON-Schema-equivalent tree copied into generated documents
//!
//! [`SchemaAdapter`] guards each of these operations: an absent or malformed
//! schema is an [`crate::error::EngineError::InvalidSchema`], never a silent pass.
//!
//! ## Backends
//!
//! [`JsonSchema`] wraps the `jsonschema` crate. Any other library can be
//! plugged in by implementing [`Schema`] for its schema type.
//!
//! ```rust
//! use brrtapi::schema::{InputLocation, IntoSchemaRef, SchemaAdapter};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": { "age": { "type": "integer", "minimum": 18 } },
//!     "required": ["age"]
//! })
//! .into_schema_ref();
//!
//! let adapter = SchemaAdapter::new();
//! let parsed = adapter
//!     .validate(Some(&schema), &json!({ "age": "21" }), InputLocation::Query)
//!     .unwrap();
//! assert_eq!(parsed, json!({ "age": 21 }));
//! ```

mod core;
mod json;
#[cfg(test)]
mod tests;

pub use core::{InputLocation, IntoSchemaRef, Schema, SchemaAdapter, SchemaRef, ValidationIssue};
pub use json::JsonSchema;
