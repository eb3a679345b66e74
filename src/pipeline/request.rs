use crate::route::HeaderVec;
use http::{Method, StatusCode};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Transport-neutral inbound request.
///
/// Carries raw path, raw query string, lowercase headers and raw body bytes;
/// parsing and validation happen in the pipeline.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl EngineRequest {
    /// Build a request from a method and a `path?query` target.
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        Self {
            method,
            path: path.to_string(),
            query,
            headers: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    /// Add a header (name lowercased)
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .push((Arc::from(name.to_ascii_lowercase()), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// JSON body with a matching content type
    #[must_use]
    pub fn json(self, value: &Value) -> Self {
        self.header("content-type", "application/json")
            .body(value.to_string())
    }

    /// Case-insensitive header lookup
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decode the query string into an object.
    ///
    /// A key seen more than once becomes an array of its values in order.
    #[must_use]
    pub fn query_object(&self) -> Value {
        let mut object = Map::new();
        let Some(query) = self.query.as_deref() else {
            return Value::Object(object);
        };
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = Value::String(value.into_owned());
            match object.get_mut(key.as_ref()) {
                Some(Value::Array(values)) => values.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    object.insert(key.into_owned(), value);
                }
            }
        }
        Value::Object(object)
    }
}

/// Transport-neutral outbound response.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineResponse {
    pub status: StatusCode,
    /// Lowercase header names
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl EngineResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Encoded body.
    ///
    /// JSON responses are serialized; a string body with a non-JSON content
    /// type is sent as-is. `204` and `304` carry no body.
    #[must_use]
    pub fn body_bytes(&self) -> Vec<u8> {
        if matches!(self.status, StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED) {
            return Vec::new();
        }
        let is_json = self
            .content_type()
            .map_or(true, |ct| ct.starts_with("application/json"));
        match &self.body {
            Value::String(text) if !is_json => text.clone().into_bytes(),
            body => body.to_string().into_bytes(),
        }
    }
}
