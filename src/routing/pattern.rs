//! Source path patterns.
//!
//! A pattern is an ordered list of segments. Each segment is a literal, a
//! named parameter (`:name`, one path component) or a terminal wildcard
//! (`*name`, the rest of the path including slashes). Matching and target
//! substitution walk these segments; no substring replacement is done on raw
//! paths, so a parameter value that also occurs elsewhere in the path cannot
//! be confused with it.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use url::Url;

/// Concrete values extracted from a request path, keyed by token (`:id`, `*rest`).
pub type SegmentValues = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("path '{0}' must start with '/'")]
    NotAbsolute(String),

    #[error("segment '{0}' needs a parameter name without braces")]
    InvalidParameterName(String),

    #[error("wildcard segment '{0}' must be the last segment")]
    MisplacedWildcard(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
    Wildcard(String),
}

impl Segment {
    fn parse(raw: &str) -> Result<Self, PatternError> {
        let (name, make): (&str, fn(String) -> Segment) = if let Some(name) = raw.strip_prefix(':') {
            (name, Segment::Param)
        } else if let Some(name) = raw.strip_prefix('*') {
            (name, Segment::Wildcard)
        } else {
            return Ok(Segment::Literal(raw.to_string()));
        };

        if name.is_empty() || name.contains(['{', '}', '/']) {
            return Err(PatternError::InvalidParameterName(raw.to_string()));
        }
        Ok(make(name.to_string()))
    }

    /// The `:name` / `*name` token for dynamic segments.
    pub fn token(&self) -> Option<String> {
        match self {
            Segment::Literal(_) => None,
            Segment::Param(name) => Some(format!(":{name}")),
            Segment::Wildcard(name) => Some(format!("*{name}")),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(literal) => f.write_str(literal),
            Segment::Param(name) => write!(f, ":{name}"),
            Segment::Wildcard(name) => write!(f, "*{name}"),
        }
    }
}

/// A parsed source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(path: &str) -> Result<Self, PatternError> {
        let components = split_path(path).ok_or_else(|| PatternError::NotAbsolute(path.to_string()))?;

        let segments = components
            .into_iter()
            .map(Segment::parse)
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(position) = segments
            .iter()
            .position(|s| matches!(s, Segment::Wildcard(_)))
        {
            if position + 1 != segments.len() {
                return Err(PatternError::MisplacedWildcard(segments[position].to_string()));
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Dynamic tokens in path order, e.g. `[":id", "*rest"]`.
    pub fn tokens(&self) -> Vec<String> {
        self.segments.iter().filter_map(Segment::token).collect()
    }

    /// Whether `path` is this pattern with every dynamic segment bound to the
    /// value the host extracted for it.
    ///
    /// A dynamic segment without an extracted value never matches.
    pub fn matches(&self, path: &str, values: &SegmentValues) -> bool {
        let Some(concrete) = split_path(path) else {
            return false;
        };

        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(literal) => {
                    if concrete.get(index) != Some(&literal.as_str()) {
                        return false;
                    }
                }
                Segment::Param(_) => {
                    let bound = segment.token().and_then(|t| values.get(&t));
                    match (concrete.get(index), bound) {
                        (Some(actual), Some(bound)) if *actual == bound.as_str() => {}
                        _ => return false,
                    }
                }
                Segment::Wildcard(_) => {
                    if index >= concrete.len() {
                        return false;
                    }
                    let remainder = concrete[index..].join("/");
                    let bound = segment.token().and_then(|t| values.get(&t));
                    return bound == Some(&remainder);
                }
            }
        }

        concrete.len() == self.segments.len()
    }

    /// Render for the host router (`/users/{id}`, `/css/{*path}`).
    pub fn to_router_syntax(&self) -> String {
        let rendered: Vec<String> = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(literal) => literal.replace('{', "{{").replace('}', "}}"),
                Segment::Param(name) => format!("{{{name}}}"),
                Segment::Wildcard(name) => format!("{{*{name}}}"),
            })
            .collect();
        format!("/{}", rendered.join("/"))
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")?;
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("invalid target url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("value for '{0}' contains a dot segment")]
    DotSegment(String),

    #[error("expanded path '{0}' leaves the target prefix")]
    OutsidePrefix(String),
}

/// Substitute extracted values into the target URL.
///
/// Only whole path components equal to a token are replaced; the query and
/// host are left alone. A value holding a `.` or `..` component, raw or
/// percent-encoded, is refused, and the expanded path must keep every
/// literal component that precedes the first substitution.
pub fn expand_target(target_url: &str, values: &SegmentValues) -> Result<Url, TargetError> {
    let mut url = Url::parse(target_url)?;
    if values.is_empty() {
        return Ok(url);
    }

    let template = url.path().to_string();
    let components: Vec<&str> = template.split('/').collect();
    let literal_len = components
        .iter()
        .position(|component| values.contains_key(*component))
        .unwrap_or(components.len());
    let prefix = components[..literal_len].join("/");

    let mut expanded = Vec::with_capacity(components.len());
    for component in &components {
        match values.get(*component) {
            Some(value) if has_dot_segment(value) => {
                return Err(TargetError::DotSegment(component.to_string()));
            }
            Some(value) => expanded.push(value.as_str()),
            None => expanded.push(component),
        }
    }
    url.set_path(&expanded.join("/"));

    if !url.path().starts_with(&prefix) {
        return Err(TargetError::OutsidePrefix(url.path().to_string()));
    }
    Ok(url)
}

/// Whether `value` has a `.`/`..` component once percent-decoded. Backslashes
/// count as separators since the url parser treats them as such.
fn has_dot_segment(value: &str) -> bool {
    let decoded = urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string());

    [value, decoded.as_str()].iter().any(|candidate| {
        candidate
            .split(['/', '\\'])
            .any(|component| component == "." || component == "..")
    })
}

/// `/a/b` → `["a", "b"]`, `/` → `[]`, relative paths → `None`.
fn split_path(path: &str) -> Option<Vec<&str>> {
    let rest = path.strip_prefix('/')?;
    if rest.is_empty() {
        Some(Vec::new())
    } else {
        Some(rest.split('/').collect())
    }
}
