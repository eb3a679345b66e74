//! # Error Taxonomy
//!
//! Every failure the route engine can report, split by when it happens:
//!
//! - **Setup-time** (fatal to the registration call): [`EngineError::DuplicateRoute`],
//!   [`EngineError::AmbiguousRoute`], [`EngineError::InvalidRoute`],
//!   [`EngineError::InvalidSchema`], [`EngineError::MissingHandler`],
//!   [`EngineError::UnknownDependency`], [`EngineError::DependencyCycle`],
//!   [`EngineError::DependencyScope`], [`EngineError::Configuration`]
//! - **Per-request** (recovered into a structured response): [`EngineError::NotFound`],
//!   [`EngineError::MethodNotAllowed`], [`EngineError::Validation`],
//!   [`EngineError::DependencyResolution`], [`EngineError::Handler`],
//!   [`EngineError::ResponseContractViolation`]
//! - **Detached** work never surfaces here; see [`crate::background::TaskError`].
//!
//! Per-request errors become a [`Problem`] body: at least `status` and `detail`,
//! plus the per-field `errors` list for validation failures. Internal details
//! are hidden unless the engine is configured to expose them.

use crate::schema::{InputLocation, ValidationIssue};
use http::{Method, StatusCode};
use serde::Serialize;
use thiserror::Error;

/// Errors raised by registration, lookup and the request pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("route {method} {path} is already registered")]
    DuplicateRoute { method: Method, path: String },

    #[error("route {method} {path} is ambiguous with already registered {existing}")]
    AmbiguousRoute {
        method: Method,
        path: String,
        existing: String,
    },

    #[error("invalid route template '{path}': {reason}")]
    InvalidRoute { path: String, reason: String },

    #[error("invalid schema for {context}: {reason}")]
    InvalidSchema { context: String, reason: String },

    #[error("route {method} {path} declares no handler")]
    MissingHandler { method: Method, path: String },

    #[error("operation id '{operation_id}' is already used by {existing}")]
    DuplicateOperationId {
        operation_id: String,
        existing: String,
    },

    #[error("route registry is frozen; routes can only be registered during setup")]
    RegistryFrozen,

    #[error("dependency '{name}' required by {route} is not declared")]
    UnknownDependency { route: String, name: String },

    #[error("circular dependency detected: {}", cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("singleton dependency '{singleton}' cannot require request-scoped '{request_scoped}'")]
    DependencyScope {
        singleton: String,
        request_scoped: String,
    },

    #[error("no route matches {method} {path}")]
    NotFound { method: Method, path: String },

    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },

    #[error("{location} validation failed with {} issue(s)", issues.len())]
    Validation {
        location: InputLocation,
        issues: Vec<ValidationIssue>,
    },

    #[error("dependency '{name}' failed to resolve: {message}")]
    DependencyResolution { name: String, message: String },

    #[error("handler failed: {0}")]
    Handler(#[from] HandlerError),

    #[error("response of {route} violates its declared schema")]
    ResponseContractViolation {
        route: String,
        issues: Vec<ValidationIssue>,
    },

    #[error("background tasks are not enabled for {route}")]
    BackgroundTasksDisabled { route: String },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl EngineError {
    /// HTTP status this error is surfaced as.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            EngineError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Handler(HandlerError::Http { status, .. }) => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error was caused by the caller rather than the server.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Build the machine-parseable response body for this error.
    ///
    /// `expose_internal` controls whether server-side failures carry their
    /// real message or a generic one.
    #[must_use]
    pub fn to_problem(&self, expose_internal: bool) -> Problem {
        let status = self.status();
        let mut problem = Problem::new(status, self.public_detail(expose_internal));
        match self {
            EngineError::Validation { location, issues } => {
                problem.errors = issues
                    .iter()
                    .map(|issue| ProblemIssue::from_issue(*location, issue))
                    .collect();
            }
            EngineError::ResponseContractViolation { issues, .. } if expose_internal => {
                problem.errors = issues
                    .iter()
                    .map(|issue| ProblemIssue::from_issue(InputLocation::Response, issue))
                    .collect();
            }
            EngineError::MethodNotAllowed { allowed, .. } => {
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                problem.headers.push(("allow".to_string(), allow));
            }
            EngineError::Handler(HandlerError::Http { headers, .. }) => {
                problem.headers.extend(headers.iter().cloned());
            }
            _ => {}
        }
        problem
    }

    fn public_detail(&self, expose_internal: bool) -> String {
        match self {
            EngineError::NotFound { .. } => "Not Found".to_string(),
            EngineError::MethodNotAllowed { .. } => "Method Not Allowed".to_string(),
            EngineError::Validation { location, .. } => {
                format!("Request {location} validation failed")
            }
            EngineError::Handler(HandlerError::Http { detail, .. }) => detail.clone(),
            _ if expose_internal => self.to_string(),
            _ => "Internal Server Error".to_string(),
        }
    }
}

/// Error returned by route handlers.
///
/// `Http` is the recognised client-facing exception: its status, detail and
/// headers reach the caller verbatim. Anything else is `Internal` and is
/// reported as a generic 500.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{status}: {detail}")]
    Http {
        status: StatusCode,
        detail: String,
        headers: Vec<(String, String)>,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    /// Client-facing error with an explicit status code.
    pub fn http(status: StatusCode, detail: impl Into<String>) -> Self {
        HandlerError::Http {
            status,
            detail: detail.into(),
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::http(StatusCode::NOT_FOUND, detail)
    }

    #[must_use]
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::http(StatusCode::BAD_REQUEST, detail)
    }

    #[must_use]
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::http(StatusCode::UNAUTHORIZED, detail)
    }

    /// Attach a response header (only meaningful for `Http` errors).
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let HandlerError::Http { headers, .. } = &mut self {
            headers.push((name.into(), value.into()));
        }
        self
    }

    /// Wrap any displayable failure as an internal error.
    pub fn internal(message: impl std::fmt::Display) -> Self {
        HandlerError::Internal(anyhow::anyhow!("{message}"))
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Internal(err.into())
    }
}

/// Structured error body returned for every failed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Problem {
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ProblemIssue>,
    /// Response headers to attach (e.g. `allow`, or headers from an `Http` error)
    #[serde(skip)]
    pub headers: Vec<(String, String)>,
}

impl Problem {
    #[must_use]
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            detail: detail.into(),
            errors: Vec::new(),
            headers: Vec::new(),
        }
    }
}

/// One violated field in a [`Problem`] body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemIssue {
    /// Location followed by the field path, e.g. `["body", "age"]`
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ProblemIssue {
    fn from_issue(location: InputLocation, issue: &ValidationIssue) -> Self {
        let mut loc = vec![location.as_str().to_string()];
        loc.extend(
            issue
                .field
                .split('.')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string),
        );
        Self {
            loc,
            msg: issue.message.clone(),
            kind: issue.kind.clone(),
        }
    }
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_problem_lists_every_field() {
        let err = EngineError::Validation {
            location: InputLocation::Body,
            issues: vec![
                ValidationIssue::new("age", "minimum", "17 is less than the minimum of 18"),
                ValidationIssue::new("address.zip", "required", "field required"),
            ],
        };
        let problem = err.to_problem(false);
        assert_eq!(problem.status, 422);
        assert_eq!(problem.errors.len(), 2);
        assert_eq!(problem.errors[0].loc, vec!["body", "age"]);
        assert_eq!(problem.errors[1].loc, vec!["body", "address", "zip"]);
    }

    #[test]
    fn internal_errors_are_hidden_by_default() {
        let err = EngineError::DependencyResolution {
            name: "db".into(),
            message: "connection refused".into(),
        };
        assert_eq!(err.to_problem(false).detail, "Internal Server Error");
        assert!(err.to_problem(true).detail.contains("connection refused"));
    }

    #[test]
    fn http_handler_error_is_honoured_verbatim() {
        let err = EngineError::Handler(
            HandlerError::http(StatusCode::IM_A_TEAPOT, "short and stout")
                .with_header("x-kettle", "on"),
        );
        let problem = err.to_problem(false);
        assert_eq!(problem.status, 418);
        assert_eq!(problem.detail, "short and stout");
        assert_eq!(problem.headers, vec![("x-kettle".into(), "on".into())]);
    }

    #[test]
    fn method_not_allowed_carries_allow_header() {
        let err = EngineError::MethodNotAllowed {
            method: Method::DELETE,
            path: "/ping".into(),
            allowed: vec![Method::GET, Method::POST],
        };
        let problem = err.to_problem(false);
        assert_eq!(problem.status, 405);
        assert_eq!(problem.headers, vec![("allow".into(), "GET, POST".into())]);
    }

    #[test]
    fn panic_payloads_are_readable() {
        let payload = std::panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 7");
        let payload = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");
    }
}
