use super::*;
use crate::dependency::Dependency;
use crate::error::EngineError;
use crate::route::{Route, RouteConfig};
use http::Method;
use serde_json::json;
use std::sync::Arc;

fn user_routes() -> Vec<Arc<Route>> {
    let get_user = Route::new(
        Method::GET,
        "/users/{id}",
        RouteConfig::new()
            .params(json!({
                "type": "object",
                "properties": { "id": { "type": "integer", "description": "User id" } },
                "required": ["id"]
            }))
            .query(json!({
                "type": "object",
                "properties": {
                    "verbose": { "type": "boolean" },
                    "fields": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["verbose"]
            }))
            .response(json!({
                "type": "object",
                "properties": { "id": { "type": "integer" }, "name": { "type": "string" } }
            }))
            .tags(["users", "read"])
            .summary("Fetch a user")
            .description("Returns one user by id")
            .operation_id("getUser")
            .deprecated(true)
            .handler(|_| async { Ok(json!({})) }),
    )
    .unwrap();

    let create_user = Route::new(
        Method::POST,
        "/users",
        RouteConfig::new()
            .body(json!({
                "type": "object",
                "properties": { "age": { "type": "integer", "minimum": 18, "maximum": 120 } },
                "required": ["age"]
            }))
            .status(201)
            .handler(|_| async { Ok(json!({})) }),
    )
    .unwrap();

    let ping = Route::new(
        Method::GET,
        "/ping",
        RouteConfig::new().handler(|_| async { Ok("pong") }),
    )
    .unwrap();

    vec![Arc::new(get_user), Arc::new(create_user), Arc::new(ping)]
}

fn info() -> DocumentInfo {
    DocumentInfo::new("Users API", "2.1.0")
        .description("User management")
        .server("https://api.example.com")
}

#[test]
fn info_and_servers_are_copied() {
    let doc = generate(&user_routes(), &info()).unwrap();
    assert_eq!(doc.openapi, OPENAPI_VERSION);
    assert_eq!(doc.info.title, "Users API");
    assert_eq!(doc.info.version, "2.1.0");
    assert_eq!(doc.info.description.as_deref(), Some("User management"));
    assert_eq!(doc.servers[0].url, "https://api.example.com");
}

#[test]
fn missing_title_or_version_is_a_configuration_error() {
    let routes = user_routes();
    for info in [
        DocumentInfo {
            version: Some("1".into()),
            ..DocumentInfo::default()
        },
        DocumentInfo {
            title: Some("T".into()),
            ..DocumentInfo::default()
        },
        DocumentInfo::new("  ", "1"),
    ] {
        assert!(matches!(
            generate(&routes, &info),
            Err(EngineError::Configuration(_))
        ));
    }
}

#[test]
fn repeated_route_in_sequence_is_rejected() {
    let routes = user_routes();
    let repeated = vec![Arc::clone(&routes[2]), Arc::clone(&routes[2])];
    assert!(matches!(
        generate(&repeated, &info()),
        Err(EngineError::Configuration(_))
    ));
}

#[test]
fn parameters_follow_template_then_query_fields() {
    let doc = generate(&user_routes(), &info()).unwrap();
    let op = doc.operation("/users/{id}", "get").unwrap();
    let params: Vec<(&str, ParameterLocation, bool)> = op
        .parameters
        .iter()
        .map(|p| (p.name.as_str(), p.location, p.required))
        .collect();
    assert_eq!(
        params,
        vec![
            ("id", ParameterLocation::Path, true),
            ("fields", ParameterLocation::Query, false),
            ("verbose", ParameterLocation::Query, true),
        ]
    );
    assert_eq!(op.parameters[0].schema["type"], "integer");
    assert_eq!(op.parameters[0].description.as_deref(), Some("User id"));
}

#[test]
fn metadata_is_copied_verbatim() {
    let doc = generate(&user_routes(), &info()).unwrap();
    let op = doc.operation("/users/{id}", "get").unwrap();
    assert_eq!(op.operation_id, "getUser");
    assert_eq!(op.tags, vec!["users", "read"]);
    assert_eq!(op.summary.as_deref(), Some("Fetch a user"));
    assert_eq!(op.description.as_deref(), Some("Returns one user by id"));
    assert!(op.deprecated);
}

#[test]
fn body_and_status_code_are_emitted() {
    let doc = generate(&user_routes(), &info()).unwrap();
    let op = doc.operation("/users", "post").unwrap();
    let body = op.request_body.as_ref().unwrap();
    assert!(body.required);
    assert_eq!(
        body.content[JSON_MEDIA_TYPE].schema["properties"]["age"]["maximum"],
        120
    );
    assert!(op.responses.contains_key("201"));
    assert!(!op.responses.contains_key("200"));
    assert_eq!(op.responses["201"].description, "Created");
}

#[test]
fn response_schema_is_structural() {
    let doc = generate(&user_routes(), &info()).unwrap();
    let op = doc.operation("/users/{id}", "get").unwrap();
    assert_eq!(
        op.responses["200"].content[JSON_MEDIA_TYPE].schema["properties"]["name"],
        json!({ "type": "string" })
    );
}

#[test]
fn validation_error_response_only_for_routes_with_inputs() {
    let doc = generate(&user_routes(), &info()).unwrap();
    assert!(doc.operation("/users", "post").unwrap().responses.contains_key("422"));
    let ping = doc.operation("/ping", "get").unwrap();
    assert!(!ping.responses.contains_key("422"));
    assert!(ping.responses["200"].content.is_empty());
    let schemas = &doc.components.as_ref().unwrap().schemas;
    assert!(schemas.contains_key("HTTPValidationError"));
    assert!(schemas.contains_key("ValidationError"));
}

#[test]
fn no_components_without_inputs() {
    let routes = user_routes();
    let doc = generate(&routes[2..], &info()).unwrap();
    assert!(doc.components.is_none());
    assert!(!doc.to_json().unwrap().contains("components"));
}

#[test]
fn regeneration_is_byte_identical() {
    let routes = user_routes();
    let a = generate(&routes, &info()).unwrap();
    let b = generate(&routes, &info()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    assert_eq!(a.fingerprint().unwrap().len(), 64);
}

#[test]
fn registration_order_does_not_change_the_document() {
    let mut routes = user_routes();
    let forward = generate(&routes, &info()).unwrap();
    routes.reverse();
    let backward = generate(&routes, &info()).unwrap();
    assert_eq!(forward.fingerprint().unwrap(), backward.fingerprint().unwrap());
}

#[test]
fn yaml_export_matches_json() {
    let doc = generate(&user_routes(), &info()).unwrap();
    let from_yaml: serde_json::Value = serde_yaml::from_str(&doc.to_yaml().unwrap()).unwrap();
    assert_eq!(from_yaml, doc.to_value().unwrap());
}

#[test]
fn route_schema_summarises_the_contract() {
    let route = Route::new(
        Method::POST,
        "/jobs",
        RouteConfig::new()
            .body(json!({ "type": "object" }))
            .dependency("queue", Dependency::value(()))
            .background(true)
            .handler(|_| async { Ok(json!({})) }),
    )
    .unwrap();
    let summary = route_schema(&route).unwrap();
    assert_eq!(summary["operationId"], "post_jobs");
    assert_eq!(summary["method"], "POST");
    assert_eq!(summary["body"], json!({ "type": "object" }));
    assert_eq!(summary["params"], serde_json::Value::Null);
    assert_eq!(summary["dependencies"][0]["name"], "queue");
    assert_eq!(summary["dependencies"][0]["lifetime"], "singleton");
    assert_eq!(summary["background"], true);
}

#[test]
fn hidden_routes_are_left_out() {
    let hidden = Arc::new(
        Route::new(
            Method::GET,
            "/internal",
            RouteConfig::new()
                .include_in_schema(false)
                .handler(|_| async { Ok(json!({})) }),
        )
        .unwrap(),
    );
    let doc = generate([&hidden], &info()).unwrap();
    assert!(doc.paths.is_empty());
}
