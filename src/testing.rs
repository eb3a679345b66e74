//! # Testing Module
//!
//! In-process harness for exercising an [`Engine`] without a transport.
//! Routes are registered exactly as in production; requests go straight
//! into [`Engine::handle`].
//!
//! ```rust
//! use brrtapi::pipeline::App;
//! use brrtapi::route::RouteConfig;
//! use brrtapi::testing::{assert_boundary_table, BoundaryCase, TestClient};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut app = App::default();
//! app.post(
//!     "/users",
//!     RouteConfig::new()
//!         .body(json!({
//!             "type": "object",
//!             "properties": { "age": { "type": "integer", "minimum": 18 } },
//!             "required": ["age"]
//!         }))
//!         .handler(|ctx| async move { Ok(ctx.body().clone()) }),
//! )
//! .unwrap();
//! let client = TestClient::new(app.build().unwrap());
//!
//! assert_boundary_table(
//!     &client,
//!     |client, age| client.post("/users").json(&json!({ "age": age })),
//!     &[BoundaryCase::reject(json!(17)), BoundaryCase::accept(json!(18))],
//! )
//! .await;
//! # }
//! ```

use crate::pipeline::{Engine, EngineRequest, EngineResponse};
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;

/// Synthetic client bound to one engine
#[derive(Clone, Debug)]
pub struct TestClient {
    engine: Engine,
}

impl TestClient {
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Start a request; `target` may carry a query string.
    #[must_use]
    pub fn request(&self, method: Method, target: &str) -> RequestBuilder {
        RequestBuilder {
            engine: self.engine.clone(),
            request: EngineRequest::new(method, target),
        }
    }

    #[must_use]
    pub fn get(&self, target: &str) -> RequestBuilder {
        self.request(Method::GET, target)
    }

    #[must_use]
    pub fn post(&self, target: &str) -> RequestBuilder {
        self.request(Method::POST, target)
    }

    #[must_use]
    pub fn put(&self, target: &str) -> RequestBuilder {
        self.request(Method::PUT, target)
    }

    #[must_use]
    pub fn patch(&self, target: &str) -> RequestBuilder {
        self.request(Method::PATCH, target)
    }

    #[must_use]
    pub fn delete(&self, target: &str) -> RequestBuilder {
        self.request(Method::DELETE, target)
    }
}

/// One synthetic request under construction
#[derive(Debug)]
pub struct RequestBuilder {
    engine: Engine,
    request: EngineRequest,
}

impl RequestBuilder {
    /// Append a query pair (percent-encoded)
    #[must_use]
    pub fn query(mut self, key: &str, value: impl AsRef<str>) -> Self {
        let pair = url::form_urlencoded::Serializer::new(String::new())
            .append_pair(key, value.as_ref())
            .finish();
        match &mut self.request.query {
            Some(query) if !query.is_empty() => {
                query.push('&');
                query.push_str(&pair);
            }
            slot => *slot = Some(pair),
        }
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.request = self.request.header(name, value);
        self
    }

    /// JSON body; a value that cannot be serialized is sent as `null`.
    #[must_use]
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        let value = serde_json::to_value(body).unwrap_or(Value::Null);
        self.request = self.request.json(&value);
        self
    }

    /// Raw body bytes, sent as-is
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.request = self.request.body(body);
        self
    }

    /// Run the request; its background tasks start once the response is
    /// captured.
    pub async fn send(self) -> TestResponse {
        let (response, after) = self.engine.dispatch(self.request).await.into_parts();
        let captured = TestResponse { inner: response };
        after.run();
        captured
    }
}

/// Response captured by the harness, with assertion helpers
#[derive(Debug, Clone)]
pub struct TestResponse {
    inner: EngineResponse,
}

impl TestResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.header(name)
    }

    #[must_use]
    pub fn json(&self) -> &Value {
        &self.inner.body
    }

    /// Deserialize the body into `T`.
    pub fn json_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.inner.body.clone())
    }

    /// Body as it would be written to the wire
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.inner.body_bytes()).into_owned()
    }

    #[must_use]
    pub fn into_inner(self) -> EngineResponse {
        self.inner
    }

    /// Field paths of a validation failure, e.g. `["body.age"]`
    #[must_use]
    pub fn error_fields(&self) -> Vec<String> {
        let Some(errors) = self.inner.body.get("errors").and_then(Value::as_array) else {
            return Vec::new();
        };
        errors
            .iter()
            .filter_map(|e| e.get("loc").and_then(Value::as_array))
            .map(|loc| {
                loc.iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(".")
            })
            .collect()
    }

    /// Panic with the body attached unless the status matches.
    #[track_caller]
    pub fn assert_status(&self, expected: u16) -> &Self {
        assert_eq!(
            self.inner.status.as_u16(),
            expected,
            "unexpected status, body: {}",
            self.inner.body
        );
        self
    }

    #[track_caller]
    pub fn assert_json(&self, expected: &Value) -> &Self {
        assert_eq!(&self.inner.body, expected, "unexpected response body");
        self
    }
}

/// What a boundary case expects from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// Any 2xx
    Accept,
    /// Input validation failure (422)
    Reject,
    /// Exactly this status
    Status(u16),
}

impl Expectation {
    fn holds(self, status: StatusCode) -> bool {
        match self {
            Expectation::Accept => status.is_success(),
            Expectation::Reject => status == StatusCode::UNPROCESSABLE_ENTITY,
            Expectation::Status(code) => status.as_u16() == code,
        }
    }
}

/// One row of a boundary table
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryCase {
    pub input: Value,
    pub expect: Expectation,
}

impl BoundaryCase {
    #[must_use]
    pub fn accept(input: Value) -> Self {
        Self {
            input,
            expect: Expectation::Accept,
        }
    }

    #[must_use]
    pub fn reject(input: Value) -> Self {
        Self {
            input,
            expect: Expectation::Reject,
        }
    }

    #[must_use]
    pub fn status(input: Value, status: u16) -> Self {
        Self {
            input,
            expect: Expectation::Status(status),
        }
    }
}

/// Outcome of one boundary row that did not meet its expectation
#[derive(Debug, Clone)]
pub struct BoundaryMismatch {
    pub case: BoundaryCase,
    pub status: StatusCode,
    pub body: Value,
}

/// Issue one request per case and collect the rows whose outcome differs
/// from the expectation. Cases run sequentially in table order.
pub async fn run_boundary_table<F>(
    client: &TestClient,
    build: F,
    cases: &[BoundaryCase],
) -> Vec<BoundaryMismatch>
where
    F: Fn(&TestClient, &Value) -> RequestBuilder,
{
    let mut mismatches = Vec::new();
    for case in cases {
        let response = build(client, &case.input).send().await;
        if !case.expect.holds(response.status()) {
            mismatches.push(BoundaryMismatch {
                case: case.clone(),
                status: response.status(),
                body: response.into_inner().body,
            });
        }
    }
    mismatches
}

/// [`run_boundary_table`], panicking with every failed row.
#[allow(clippy::panic)]
pub async fn assert_boundary_table<F>(client: &TestClient, build: F, cases: &[BoundaryCase])
where
    F: Fn(&TestClient, &Value) -> RequestBuilder,
{
    let mismatches = run_boundary_table(client, build, cases).await;
    if mismatches.is_empty() {
        return;
    }
    let mut report = String::new();
    for m in &mismatches {
        writeln!(
            report,
            "  input {} expected {:?}, got {} {}",
            m.case.input, m.case.expect, m.status, m.body
        )
        .ok();
    }
    panic!(
        "{} of {} boundary cases failed:\n{report}",
        mismatches.len(),
        cases.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::App;
    use crate::route::RouteConfig;
    use serde_json::json;

    fn client() -> TestClient {
        let mut app = App::default();
        app.get(
            "/echo",
            RouteConfig::new().handler(|ctx| async move { Ok(ctx.query().clone()) }),
        )
        .unwrap();
        app.put(
            "/ages",
            RouteConfig::new()
                .body(json!({
                    "type": "object",
                    "properties": { "age": { "type": "integer", "minimum": 18, "maximum": 120 } },
                    "required": ["age"]
                }))
                .handler(|ctx| async move { Ok(ctx.body().clone()) }),
        )
        .unwrap();
        TestClient::new(app.build().unwrap())
    }

    #[tokio::test]
    async fn query_pairs_are_encoded_and_appended() {
        let response = client()
            .get("/echo?a=1")
            .query("b", "x y")
            .query("c", "&")
            .send()
            .await;
        response
            .assert_status(200)
            .assert_json(&json!({ "a": "1", "b": "x y", "c": "&" }));
    }

    #[tokio::test]
    async fn error_fields_are_dotted() {
        let response = client().put("/ages").json(&json!({ "age": "x" })).send().await;
        response.assert_status(422);
        assert_eq!(response.error_fields(), vec!["body.age"]);
    }

    #[tokio::test]
    async fn boundary_table_reports_mismatches() {
        let client = client();
        let cases = [
            BoundaryCase::reject(json!(17)),
            BoundaryCase::accept(json!(18)),
            // Deliberately wrong expectation
            BoundaryCase::accept(json!(121)),
            BoundaryCase::status(json!(120), 200),
        ];
        let mismatches = run_boundary_table(
            &client,
            |c, age| c.put("/ages").json(&json!({ "age": age })),
            &cases,
        )
        .await;
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].case.input, json!(121));
        assert_eq!(mismatches[0].status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    #[should_panic(expected = "1 of 1 boundary cases failed")]
    async fn boundary_assertion_panics_on_mismatch() {
        let client = client();
        assert_boundary_table(
            &client,
            |c, age| c.put("/ages").json(&json!({ "age": age })),
            &[BoundaryCase::accept(json!(5))],
        )
        .await;
    }
}
