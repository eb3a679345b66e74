#![allow(dead_code)]

use brrtapi::testing::TestClient;
use brrtapi::{App, DocumentInfo, EngineConfig, RouteConfig};
use serde_json::{json, Value};

pub fn user_id_params() -> Value {
    json!({
        "type": "object",
        "properties": { "id": { "type": "integer", "description": "User id" } },
        "required": ["id"]
    })
}

pub fn signup_body() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "minLength": 1 },
            "age": { "type": "integer", "minimum": 18, "maximum": 120 }
        },
        "required": ["name", "age"]
    })
}

pub fn user_response() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "integer" },
            "name": { "type": "string" }
        },
        "required": ["id"]
    })
}

/// `GET /users/{id}` and `POST /users` with the default configuration
pub fn users_app(config: EngineConfig) -> App {
    let mut app = App::new(config);
    app.info(DocumentInfo::new("Users", "1.0.0").description("User directory"));
    app.get(
        "/users/{id}",
        RouteConfig::new()
            .params(user_id_params())
            .response(user_response())
            .operation_id("get_user")
            .tag("users")
            .handler(|ctx| async move { Ok(json!({ "id": ctx.params()["id"], "name": "ada" })) }),
    )
    .unwrap();
    app.post(
        "/users",
        RouteConfig::new()
            .body(signup_body())
            .status(201)
            .operation_id("create_user")
            .tag("users")
            .handler(|ctx| async move { Ok(ctx.body().clone()) }),
    )
    .unwrap();
    app
}

pub fn users_client() -> TestClient {
    TestClient::new(users_app(EngineConfig::default()).build().unwrap())
}
