use brrtapi::registry::RouteRegistry;
use brrtapi::{EngineError, Route, RouteConfig};
use http::Method;
use serde_json::json;

fn ok() -> RouteConfig {
    RouteConfig::new().handler(|_| async { Ok(json!(null)) })
}

#[test]
fn test_duplicate_ping_is_rejected() {
    let mut registry = RouteRegistry::new();
    registry
        .register(Route::new(Method::GET, "/ping", ok()).unwrap())
        .unwrap();

    let err = registry
        .register(Route::new(Method::GET, "/ping", ok().operation_id("ping_again")).unwrap())
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateRoute { .. }), "{err}");
    assert_eq!(registry.len(), 1);

    // Another method on the same path is fine
    registry
        .register(Route::new(Method::POST, "/ping", ok()).unwrap())
        .unwrap();
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_literal_and_param_siblings_are_ambiguous() {
    let mut registry = RouteRegistry::new();
    registry
        .register(Route::new(Method::GET, "/users/{id}", ok()).unwrap())
        .unwrap();
    let err = registry
        .register(Route::new(Method::GET, "/users/me", ok()).unwrap())
        .unwrap_err();
    assert!(matches!(err, EngineError::AmbiguousRoute { .. }), "{err}");
}

#[test]
fn test_lookup_extracts_raw_params() {
    let mut registry = RouteRegistry::new();
    for path in [
        "/",
        "/zoo/animals",
        "/zoo/animals/{id}",
        "/zoo/animals/{id}/toys/{toy_id}",
        "/zoo/{category}/animals/{id}/habitats/{habitat_id}",
    ] {
        registry
            .register(Route::new(Method::GET, path, ok()).unwrap())
            .unwrap();
    }

    let root = registry.find(&Method::GET, "/").unwrap();
    assert_eq!(root.route.path(), "/");
    assert!(root.params.is_empty());

    let toy = registry
        .find(&Method::GET, "/zoo/animals/123/toys/456")
        .unwrap();
    assert_eq!(toy.route.path(), "/zoo/animals/{id}/toys/{toy_id}");
    assert_eq!(toy.param("id"), Some("123"));
    assert_eq!(toy.param("toy_id"), Some("456"));

    let habitat = registry
        .find(&Method::GET, "/zoo/cats/animals/7/habitats/9")
        .unwrap();
    let names: Vec<&str> = habitat.params.iter().map(|(k, _)| k.as_ref()).collect();
    assert_eq!(names, vec!["category", "id", "habitat_id"]);

    assert!(matches!(
        registry.find(&Method::GET, "/zoo/animals/123/toys"),
        Err(EngineError::NotFound { .. })
    ));
    assert!(matches!(
        registry.find(&Method::GET, "/Zoo/animals"),
        Err(EngineError::NotFound { .. })
    ));
}

#[test]
fn test_method_not_allowed_lists_methods() {
    let mut registry = RouteRegistry::new();
    registry
        .register(Route::new(Method::GET, "/items/{id}", ok()).unwrap())
        .unwrap();
    registry
        .register(Route::new(Method::DELETE, "/items/{id}", ok()).unwrap())
        .unwrap();

    match registry.find(&Method::PUT, "/items/1") {
        Err(EngineError::MethodNotAllowed { allowed, .. }) => {
            assert!(allowed.contains(&Method::GET));
            assert!(allowed.contains(&Method::DELETE));
            assert_eq!(allowed.len(), 2);
        }
        other => panic!("expected 405, got {other:?}"),
    }
}

#[test]
fn test_frozen_registry_rejects_registration() {
    let mut registry = RouteRegistry::new();
    registry.freeze();
    let err = registry
        .register(Route::new(Method::GET, "/late", ok()).unwrap())
        .unwrap_err();
    assert!(matches!(err, EngineError::RegistryFrozen));
}
