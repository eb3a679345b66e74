//! Reserved documentation routes.

use crate::config::EngineConfig;
use crate::error::{EngineError, HandlerError};
use crate::route::{Route, RouteConfig};
use http::Method;
use serde_json::Value;

const DOCS_TAG: &str = "docs";

fn engine_failure(err: EngineError) -> HandlerError {
    HandlerError::internal(err)
}

/// `GET {docs_path}`, `GET {docs_yaml_path}` and
/// `GET {schema_path_prefix}/{operation_id}`, all hidden from the document.
pub(crate) fn docs_routes(config: &EngineConfig) -> Result<Vec<Route>, EngineError> {
    let json = Route::new(
        Method::GET,
        &config.docs_path,
        RouteConfig::new()
            .tag(DOCS_TAG)
            .summary("Generated OpenAPI document")
            .operation_id("openapi_json")
            .include_in_schema(false)
            .handler(|ctx| async move {
                let document = ctx.introspection()?.document().map_err(engine_failure)?;
                Ok(document.to_value()?)
            }),
    )?;

    let yaml = Route::new(
        Method::GET,
        &config.docs_yaml_path,
        RouteConfig::new()
            .tag(DOCS_TAG)
            .summary("Generated OpenAPI document (YAML)")
            .operation_id("openapi_yaml")
            .include_in_schema(false)
            .handler(|ctx| async move {
                let document = ctx.introspection()?.document().map_err(engine_failure)?;
                let yaml = document.to_yaml().map_err(HandlerError::internal)?;
                ctx.set_response_header("content-type", "application/yaml");
                Ok(Value::String(yaml))
            }),
    )?;

    let prefix = config.schema_path_prefix.trim_end_matches('/');
    let schema = Route::new(
        Method::GET,
        &format!("{prefix}/{{operation_id}}"),
        RouteConfig::new()
            .tag(DOCS_TAG)
            .summary("Declared contract of one route")
            .operation_id("route_schema")
            .include_in_schema(false)
            .handler(|ctx| async move {
                let operation_id = ctx.raw_param("operation_id").unwrap_or_default();
                match ctx.introspection()?.route_schema(operation_id) {
                    Some(summary) => summary.map_err(engine_failure),
                    None => Err(HandlerError::not_found(format!(
                        "no route with operation id '{operation_id}'"
                    ))),
                }
            }),
    )?;

    Ok(vec![json, yaml, schema])
}
