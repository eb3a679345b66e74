use crate::error::EngineError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Parameter names are identifiers: they become object keys in parsed params
static PARAM_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("parameter name regex should be valid")
});

/// One segment of a path template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Must match the request segment exactly (case-sensitive)
    Literal(String),
    /// Matches any single non-empty request segment
    Param(Arc<str>),
}

impl Segment {
    #[must_use]
    pub fn is_param(&self) -> bool {
        matches!(self, Segment::Param(_))
    }
}

/// A parsed, normalized path template such as `/users/{id}/posts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    normalized: String,
    key: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse and normalize a template.
    ///
    /// Duplicate slashes collapse and a trailing slash is dropped. A segment is
    /// a parameter only when it is exactly `{name}`; names must be identifiers
    /// and unique within the template.
    pub fn parse(path: &str) -> Result<Self, EngineError> {
        let invalid = |reason: &str| EngineError::InvalidRoute {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if !path.starts_with('/') {
            return Err(invalid("template must start with '/'"));
        }

        let mut segments = Vec::new();
        for raw in split_segments(path) {
            if let Some(name) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                if !is_identifier(name) {
                    return Err(invalid(&format!(
                        "parameter name '{name}' is not a valid identifier"
                    )));
                }
                if segments
                    .iter()
                    .any(|s| matches!(s, Segment::Param(existing) if existing.as_ref() == name))
                {
                    return Err(invalid(&format!("parameter '{name}' appears more than once")));
                }
                segments.push(Segment::Param(Arc::from(name)));
            } else if raw.contains('{') || raw.contains('}') {
                return Err(invalid(&format!(
                    "segment '{raw}' mixes literal text and a parameter"
                )));
            } else {
                segments.push(Segment::Literal(raw.to_string()));
            }
        }

        let normalized = render(&segments, |name| format!("{{{name}}}"));
        let key = render(&segments, |_| "{}".to_string());
        Ok(Self {
            normalized,
            key,
            segments,
        })
    }

    /// The normalized template, e.g. `/users/{id}`
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Shape of the template with parameter names erased, e.g. `/users/{}`.
    ///
    /// Two templates with the same key match exactly the same request paths.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Parameter names in template order
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_ref()),
            Segment::Literal(_) => None,
        })
    }

    /// Whether some request path could match both templates while they
    /// differ in at least one literal-vs-parameter position.
    #[must_use]
    pub fn overlaps(&self, other: &PathTemplate) -> bool {
        if self.segments.len() != other.segments.len() || self.key == other.key {
            return false;
        }
        self.segments
            .iter()
            .zip(&other.segments)
            .all(|pair| match pair {
                (Segment::Literal(a), Segment::Literal(b)) => a == b,
                _ => true,
            })
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

/// Collapse duplicate slashes and drop the trailing slash (root stays `/`).
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = split_segments(path).collect();
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::with_capacity(path.len());
    for segment in segments {
        out.push('/');
        out.push_str(segment);
    }
    out
}

/// Non-empty `/`-separated segments of a path
pub fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn is_identifier(name: &str) -> bool {
    PARAM_NAME.is_match(name)
}

fn render(segments: &[Segment], param: impl Fn(&str) -> String) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    segments
        .iter()
        .map(|s| match s {
            Segment::Literal(lit) => format!("/{lit}"),
            Segment::Param(name) => format!("/{}", param(name)),
        })
        .collect()
}
